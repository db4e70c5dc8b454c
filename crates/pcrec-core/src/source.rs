//! Reading configuration payloads from the source directory.
//!
//! Two read policies exist and are selected by the caller:
//!
//! - [`SourceReader::read_all`] always goes to the files. The sync pipeline
//!   uses it because every run must reflect the current source of truth.
//! - [`resolve_from_store_then_source`] prefers what the store already holds
//!   and only falls back to the files for keys the store lacks. Ad-hoc
//!   publishing uses it.

use crate::error::AppError;
use crate::models::{ConfigKey, Payload, SourcePayloads};
use crate::store::ConfigStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filesystem-backed reader for the `components` and `rules` artifacts.
#[derive(Debug, Clone)]
pub struct SourceReader {
    dir: PathBuf,
}

impl SourceReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: ConfigKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Reads both artifacts.
    ///
    /// Presence of every artifact is checked before any is parsed, so a
    /// `SourceMissing` error lists all absent files at once.
    pub fn read_all(&self) -> Result<SourcePayloads, AppError> {
        let missing: Vec<String> = ConfigKey::ALL
            .iter()
            .filter(|key| !self.path_for(**key).is_file())
            .map(|key| key.file_name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::SourceMissing(missing));
        }

        Ok(SourcePayloads {
            components: self.read(ConfigKey::Components)?,
            rules: self.read(ConfigKey::Rules)?,
        })
    }

    /// Reads a single artifact.
    pub fn read(&self, key: ConfigKey) -> Result<Payload, AppError> {
        let path = self.path_for(key);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::SourceMissing(vec![key.file_name().to_string()]),
            _ => AppError::SourceMalformed {
                name: key.file_name().to_string(),
                reason: format!("cannot read file: {}", e),
            },
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read source artifact");
        parse_payload(key.file_name(), &bytes)
    }
}

/// Parses `bytes` as a JSON object, naming the artifact on failure.
pub fn parse_payload(name: &str, bytes: &[u8]) -> Result<Payload, AppError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| AppError::SourceMalformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AppError::SourceMalformed {
            name: name.to_string(),
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    Store,
    Source,
}

impl PayloadOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadOrigin::Store => "store",
            PayloadOrigin::Source => "source",
        }
    }
}

/// Payloads resolved by [`resolve_from_store_then_source`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPayloads {
    pub payloads: SourcePayloads,
    pub components_origin: PayloadOrigin,
    pub rules_origin: PayloadOrigin,
}

impl ResolvedPayloads {
    /// True when every payload came from the store.
    pub fn all_from_store(&self) -> bool {
        self.components_origin == PayloadOrigin::Store && self.rules_origin == PayloadOrigin::Store
    }
}

/// Resolves each key from the store first, then from the source directory.
///
/// A source artifact is only touched for keys the store has no entry for.
/// Store errors are returned as-is rather than masked by a source read.
pub async fn resolve_from_store_then_source(
    store: &dyn ConfigStore,
    reader: &SourceReader,
) -> Result<ResolvedPayloads, AppError> {
    let (components, components_origin) =
        resolve_key(store, reader, ConfigKey::Components).await?;
    let (rules, rules_origin) = resolve_key(store, reader, ConfigKey::Rules).await?;

    Ok(ResolvedPayloads {
        payloads: SourcePayloads { components, rules },
        components_origin,
        rules_origin,
    })
}

async fn resolve_key(
    store: &dyn ConfigStore,
    reader: &SourceReader,
    key: ConfigKey,
) -> Result<(Payload, PayloadOrigin), AppError> {
    match store.get(key.as_str()).await? {
        Some(entry) => Ok((entry.payload, PayloadOrigin::Store)),
        None => {
            debug!(key = %key, "No stored entry, falling back to source");
            Ok((reader.read(key)?, PayloadOrigin::Source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_read_all() {
        let dir = TempDir::new().unwrap();
        write(&dir, "components.json", r#"{"cpu": ["A", "B"]}"#);
        write(&dir, "rules.json", r#"{"minBudget": 500}"#);

        let payloads = SourceReader::new(dir.path()).read_all().unwrap();
        assert_eq!(payloads.components["cpu"], json!(["A", "B"]));
        assert_eq!(payloads.rules["minBudget"], json!(500));
    }

    #[test]
    fn test_missing_rules_named() {
        let dir = TempDir::new().unwrap();
        write(&dir, "components.json", "{}");

        let err = SourceReader::new(dir.path()).read_all().unwrap_err();
        match err {
            AppError::SourceMissing(names) => assert_eq!(names, vec!["rules.json"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_both_named() {
        let dir = TempDir::new().unwrap();
        let err = SourceReader::new(dir.path()).read_all().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing data files: components.json, rules.json"
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let reader = SourceReader::new(dir.path().join("absent"));
        assert!(matches!(
            reader.read_all(),
            Err(AppError::SourceMissing(names)) if names.len() == 2
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        write(&dir, "components.json", "{}");
        write(&dir, "rules.json", "{ not json");

        let err = SourceReader::new(dir.path()).read_all().unwrap_err();
        assert!(matches!(
            err,
            AppError::SourceMalformed { ref name, .. } if name == "rules.json"
        ));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = parse_payload("components.json", b"[1, 2, 3]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed data file components.json: expected a JSON object, found an array"
        );
    }

    #[test]
    fn test_empty_object_is_valid() {
        assert!(parse_payload("rules.json", b"{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_prefers_store() {
        let dir = TempDir::new().unwrap();
        write(&dir, "components.json", r#"{"from": "source"}"#);
        write(&dir, "rules.json", r#"{"from": "source"}"#);

        let store = MemoryConfigStore::new();
        let stored = json!({"from": "store"}).as_object().unwrap().clone();
        store.upsert("components", &stored).await.unwrap();

        let resolved = resolve_from_store_then_source(&store, &SourceReader::new(dir.path()))
            .await
            .unwrap();

        assert_eq!(resolved.components_origin, PayloadOrigin::Store);
        assert_eq!(resolved.rules_origin, PayloadOrigin::Source);
        assert_eq!(resolved.payloads.components["from"], "store");
        assert_eq!(resolved.payloads.rules["from"], "source");
        assert!(!resolved.all_from_store());
    }

    #[tokio::test]
    async fn test_resolve_skips_source_when_store_complete() {
        // Source directory does not exist at all.
        let dir = TempDir::new().unwrap();
        let reader = SourceReader::new(dir.path().join("absent"));

        let store = MemoryConfigStore::new();
        store.upsert("components", &Payload::new()).await.unwrap();
        store.upsert("rules", &Payload::new()).await.unwrap();

        let resolved = resolve_from_store_then_source(&store, &reader).await.unwrap();
        assert!(resolved.all_from_store());
    }

    #[tokio::test]
    async fn test_resolve_fails_when_neither_has_key() {
        let dir = TempDir::new().unwrap();
        write(&dir, "components.json", "{}");

        let store = MemoryConfigStore::new();
        let err = resolve_from_store_then_source(&store, &SourceReader::new(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SourceMissing(names) if names == vec!["rules.json"]));
    }
}
