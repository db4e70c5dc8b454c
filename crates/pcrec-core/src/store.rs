//! Keyed configuration persistence.
//!
//! [`ConfigStore`] is the only durable shared resource of the sync pipeline.
//! Implementations serialize writes per key themselves; callers never lock.

use crate::error::AppError;
use crate::models::{validate_key, ConfigEntry, Payload};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Insert-or-update storage for configuration payloads.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Inserts `key` or replaces its payload, refreshing `updated_at`.
    ///
    /// Concurrent upserts of the same key resolve to exactly one of the
    /// written payloads; there is no merging.
    async fn upsert(&self, key: &str, payload: &Payload) -> Result<ConfigEntry, AppError>;

    /// Returns the entry for `key`, or `None` when it was never written.
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError>;

    /// Returns every entry ordered by key ascending.
    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError>;
}

/// Process-local store used by tests and by deployments without a database.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<BTreeMap<String, ConfigEntry>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AppError {
        AppError::PersistenceUnavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn upsert(&self, key: &str, payload: &Payload) -> Result<ConfigEntry, AppError> {
        validate_key(key)?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        // Stamped under the lock so the last writer carries the latest time.
        let entry = ConfigEntry {
            key: key.to_string(),
            payload: payload.clone(),
            updated_at: Utc::now(),
        };
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<ConfigEntry>, AppError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.values().cloned().collect())
    }
}
