//! pcrec Core - configuration store contract, sync pipeline and scheduler.

pub mod config;
pub mod error;
pub mod models;
pub mod publish;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod sync;

pub use config::{default_config_path, load_sync_config, DbConfig, SyncConfig};
pub use error::AppError;
pub use models::{ConfigEntry, ConfigKey, Payload, SourcePayloads, SyncRunState, SyncStatus};
pub use publish::Publisher;
pub use scheduler::SyncScheduler;
pub use source::{resolve_from_store_then_source, PayloadOrigin, ResolvedPayloads, SourceReader};
pub use store::{ConfigStore, MemoryConfigStore};
pub use sync::{
    classify_change, KeyChange, SharedRunState, SyncOutcome, SyncRunner, SyncStage, SyncStats,
};
