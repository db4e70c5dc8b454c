//! Domain types shared by the store, the sync pipeline and the CLI.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A configuration payload: always a JSON object at the top level.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Longest key the `config_store.key` column accepts.
pub const MAX_KEY_LEN: usize = 50;

/// The two configuration blobs kept in sync with the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    Components,
    Rules,
}

impl ConfigKey {
    /// Keys in persistence order. Rules may reference component ids, so
    /// components always go first.
    pub const ALL: [ConfigKey; 2] = [ConfigKey::Components, ConfigKey::Rules];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Components => "components",
            ConfigKey::Rules => "rules",
        }
    }

    /// Name of the artifact in the source and publish directories.
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigKey::Components => "components.json",
            ConfigKey::Rules => "rules.json",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that `key` fits the store's key column.
pub fn validate_key(key: &str) -> Result<(), AppError> {
    if key.trim().is_empty() || key.chars().count() > MAX_KEY_LEN {
        return Err(AppError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// One row of the configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub payload: Payload,
    /// Set by the store on every write.
    pub updated_at: DateTime<Utc>,
}

/// The pair of payloads a sync run moves from source to store to publish
/// location.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePayloads {
    pub components: Payload,
    pub rules: Payload,
}

impl SourcePayloads {
    pub fn get(&self, key: ConfigKey) -> &Payload {
        match key {
            ConfigKey::Components => &self.components,
            ConfigKey::Rules => &self.rules,
        }
    }
}

/// Computes a SHA-256 hash of a payload's canonical JSON form.
///
/// Object keys serialize in sorted order, so equal payloads always hash
/// equally regardless of how their source files were laid out.
///
/// # Examples
///
/// ```
/// use pcrec_core::models::payload_hash;
/// use serde_json::json;
///
/// let a = json!({"b": 1, "a": 2}).as_object().unwrap().clone();
/// let b = json!({"a": 2, "b": 1}).as_object().unwrap().clone();
/// assert_eq!(payload_hash(&a), payload_hash(&b));
/// assert_eq!(payload_hash(&a).len(), 64);
/// ```
pub fn payload_hash(payload: &Payload) -> String {
    let mut hasher = Sha256::new();
    // Serializing a Map<String, Value> cannot fail. Keys serialize sorted
    // (no `preserve_order`), which makes the bytes canonical.
    hasher.update(serde_json::to_vec(payload).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

/// Outcome of the most recent completed sync attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Never,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Never => "never",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide record of the last sync attempt, as exposed to status readers.
///
/// Serializes as `{"lastRunAt": ..., "lastStatus": ..., "lastMessage": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: SyncStatus,
    pub last_message: String,
}
