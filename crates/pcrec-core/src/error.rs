use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all errors that can occur while reading, persisting
/// and publishing configuration payloads. It uses the `thiserror` crate for
/// ergonomic error handling and automatic conversion from underlying library
/// errors.
///
/// # Error Conversion
///
/// Some errors convert automatically from their source types using `#[from]`:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use pcrec_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::SourceMissing(vec!["rules.json".to_string()]))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// One or more required source artifacts are absent.
    ///
    /// Carries the file name of every missing artifact, never just the first.
    #[error("Missing data files: {}", .0.join(", "))]
    SourceMissing(Vec<String>),

    /// A source artifact exists but could not be parsed as a JSON object.
    #[error("Malformed data file {name}: {reason}")]
    SourceMalformed { name: String, reason: String },

    /// The configuration store could not complete a read or write.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Writing a published artifact failed.
    #[error("Publish to {path} failed: {reason}")]
    PublishFailed { path: String, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A store key is empty or longer than the backing column allows.
    #[error("Invalid config key: {0:?}")]
    InvalidKey(String),

    /// Configuration file or environment value could not be interpreted.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::SourceMissing(names) => {
                format!(
                    "Missing data files: {}\n   Check DATA_DIR points at the directory holding components.json and rules.json.",
                    names.join(", ")
                )
            }
            AppError::SourceMalformed { name, reason } => {
                format!(
                    "{} is not a valid JSON object: {}\n   Fix the file and run the sync again.",
                    name, reason
                )
            }
            AppError::PublishFailed { path, reason } => {
                format!(
                    "Could not write {}: {}\n   Check PUBLIC_DATA_DIR exists or can be created.",
                    path, reason
                )
            }
            AppError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n   Omit --config to use defaults and environment variables.",
                    path
                )
            }
            _ => self.to_string(),
        }
    }
}
