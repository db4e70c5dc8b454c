//! Configuration types for pcrec components.
//!
//! Sync settings are layered: built-in defaults, then an optional TOML file,
//! then environment variables. The result is immutable for the lifetime of
//! the process.
//!
//! ```toml
//! [sync]
//! interval_seconds = 3600
//! enabled = true
//! source_location = "/srv/pcrec/data"
//! publish_location = "/srv/www/data"
//! ```

use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`SyncConfig::interval_seconds`].
pub const ENV_SYNC_INTERVAL: &str = "SYNC_INTERVAL_SECONDS";
/// Environment variable overriding [`SyncConfig::enabled`].
pub const ENV_SYNC_ENABLED: &str = "SYNC_ENABLED";
/// Environment variable overriding [`SyncConfig::source_location`].
pub const ENV_DATA_DIR: &str = "DATA_DIR";
/// Environment variable overriding [`SyncConfig::publish_location`].
pub const ENV_PUBLIC_DATA_DIR: &str = "PUBLIC_DATA_DIR";

const DEFAULT_INTERVAL_SECS: u64 = 86_400;

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// Background synchronization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between two periodic runs. Must be positive.
    pub interval_seconds: u64,
    /// Whether the periodic loop runs at all. On-demand triggers ignore this.
    pub enabled: bool,
    /// Directory holding `components.json` and `rules.json`.
    pub source_location: PathBuf,
    /// Directory mirrored after each successful run. `None` disables publishing.
    pub publish_location: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECS,
            enabled: true,
            source_location: PathBuf::from("data"),
            publish_location: None,
        }
    }
}

impl SyncConfig {
    /// Interval between periodic runs.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Rejects settings the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval_seconds == 0 {
            return Err(AppError::ConfigError(
                "interval_seconds must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Empty values are treated as unset, so `PUBLIC_DATA_DIR=""` leaves
    /// publishing disabled.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_SYNC_INTERVAL) {
            self.interval_seconds = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_SYNC_INTERVAL, raw
                ))
            })?;
        }
        if let Some(raw) = get(ENV_SYNC_ENABLED) {
            self.enabled = parse_flag(&raw);
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            self.source_location = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_PUBLIC_DATA_DIR) {
            self.publish_location = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}

/// Interprets a boolean switch the way the deployment scripts write them.
///
/// Only `1`, `true`, `yes` and `on` (any case) enable the flag.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncConfig,
}

/// Returns the default config path: `~/.config/pcrec/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pcrec").join("config.toml"))
}

/// Parses the `[sync]` table of a TOML document.
pub fn parse_sync_config(content: &str) -> Result<SyncConfig, AppError> {
    let file: ConfigFile = toml::from_str(content)
        .map_err(|e| AppError::ConfigError(format!("invalid TOML: {}", e)))?;
    Ok(file.sync)
}

/// Loads the sync configuration from file and process environment.
///
/// An explicit `path` must exist. Without one, the default path is used when
/// present and defaults apply otherwise.
pub fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig, AppError> {
    let base = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AppError::ConfigNotFound(p.display().to_string()));
            }
            read_config_file(p)?
        }
        None => match default_config_path() {
            Some(p) if p.exists() => read_config_file(&p)?,
            _ => SyncConfig::default(),
        },
    };

    let config = base.with_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<SyncConfig, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_sync_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.interval_seconds, 86_400);
        assert_eq!(config.interval(), Duration::from_secs(86_400));
        assert!(config.enabled);
        assert_eq!(config.source_location, PathBuf::from("data"));
        assert!(config.publish_location.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = SyncConfig::default()
            .with_env(lookup(&[
                (ENV_SYNC_INTERVAL, "60"),
                (ENV_SYNC_ENABLED, "no"),
                (ENV_DATA_DIR, "/srv/data"),
                (ENV_PUBLIC_DATA_DIR, "/srv/www"),
            ]))
            .unwrap();

        assert_eq!(config.interval_seconds, 60);
        assert!(!config.enabled);
        assert_eq!(config.source_location, PathBuf::from("/srv/data"));
        assert_eq!(config.publish_location, Some(PathBuf::from("/srv/www")));
    }

    #[test]
    fn test_empty_public_dir_disables_publishing() {
        let config = SyncConfig::default()
            .with_env(lookup(&[(ENV_PUBLIC_DATA_DIR, "")]))
            .unwrap();
        assert!(config.publish_location.is_none());
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let err = SyncConfig::default()
            .with_env(lookup(&[(ENV_SYNC_INTERVAL, "daily")]))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let zero = SyncConfig {
            interval_seconds: 0,
            ..SyncConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        for raw in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(parse_flag(raw), "{raw} should enable");
        }
        for raw in ["0", "false", "off", "enabled"] {
            assert!(!parse_flag(raw), "{raw} should disable");
        }
    }

    #[test]
    fn test_parse_sync_config_partial_table() {
        let config = parse_sync_config(
            r#"
            [sync]
            interval_seconds = 3600
            publish_location = "public/data"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval_seconds, 3600);
        assert!(config.enabled);
        assert_eq!(config.source_location, PathBuf::from("data"));
        assert_eq!(config.publish_location, Some(PathBuf::from("public/data")));
    }

    #[test]
    fn test_parse_sync_config_without_table() {
        let config = parse_sync_config("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_sync_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, AppError::ConfigNotFound(_)));
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nenabled = false\n").unwrap();

        let config = read_config_file(&path).unwrap();
        assert!(!config.enabled);
    }
}
