//! One synchronization attempt: read, persist, publish.
//!
//! [`SyncRunner::run_once`] never returns an error. Every failure is folded
//! into the returned [`SyncOutcome`] and into the shared [`SyncRunState`].

use crate::error::AppError;
use crate::models::{payload_hash, ConfigKey, Payload, SyncRunState, SyncStatus};
use crate::publish::Publisher;
use crate::source::SourceReader;
use crate::store::ConfigStore;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// How a key's stored payload changed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChange {
    /// Payload hash matches the stored one; only `updated_at` moved.
    Unchanged,
    /// Stored payload replaced with different content.
    Updated,
    /// Key had no stored entry before this run.
    Created,
}

/// Per-run change counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change, incrementing the appropriate counter.
    pub fn record(&mut self, change: KeyChange) {
        match change {
            KeyChange::Unchanged => self.unchanged += 1,
            KeyChange::Updated => self.updated += 1,
            KeyChange::Created => self.created += 1,
        }
    }
}

/// Classifies an upsert by comparing content hashes.
///
/// # Arguments
/// * `existing_hash` - Hash of the stored payload (None if the key is new)
/// * `new_hash` - Hash of the payload about to be written
pub fn classify_change(existing_hash: Option<&str>, new_hash: &str) -> KeyChange {
    match existing_hash {
        Some(hash) if hash == new_hash => KeyChange::Unchanged,
        Some(_) => KeyChange::Updated,
        None => KeyChange::Created,
    }
}

/// Pipeline position of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Reading,
    Persisting,
    Publishing,
    Done,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Reading => "reading",
            SyncStage::Persisting => "persisting",
            SyncStage::Publishing => "publishing",
            SyncStage::Done => "done",
        }
    }
}

/// Result of one run, handed back to whoever triggered it.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    /// Stage that failed, `None` on success.
    pub failed_stage: Option<SyncStage>,
    /// Keys persisted by this run, in write order.
    pub changes: Vec<(ConfigKey, KeyChange)>,
    /// Directory the artifacts were published to, if publishing ran.
    pub published_to: Option<PathBuf>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }

    /// Aggregated change counters for the persisted keys.
    pub fn stats(&self) -> SyncStats {
        let mut stats = SyncStats::new();
        for (_, change) in &self.changes {
            stats.record(*change);
        }
        stats
    }

    /// Outcome for a run that died without producing its own result.
    pub(crate) fn aborted(started_at: DateTime<Utc>, message: String) -> Self {
        Self {
            status: SyncStatus::Failed,
            message,
            started_at,
            failed_stage: None,
            changes: Vec::new(),
            published_to: None,
        }
    }
}

/// Shared, lock-protected [`SyncRunState`].
///
/// Clones share the same record. Every write replaces the whole record, so
/// readers never observe a status from one run paired with a message from
/// another.
#[derive(Debug, Clone, Default)]
pub struct SharedRunState {
    inner: Arc<RwLock<SyncRunState>>,
}

impl SharedRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current record.
    pub fn snapshot(&self) -> SyncRunState {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn commit(&self, state: SyncRunState) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Records a completed attempt.
    pub fn record(&self, run_at: DateTime<Utc>, status: SyncStatus, message: String) {
        self.commit(SyncRunState {
            last_run_at: Some(run_at),
            last_status: status,
            last_message: message,
        });
    }

    /// Records a failed attempt.
    pub fn record_failure(&self, run_at: DateTime<Utc>, message: String) {
        self.record(run_at, SyncStatus::Failed, message);
    }
}

/// Working state of a run in progress.
struct RunProgress {
    stage: SyncStage,
    changes: Vec<(ConfigKey, KeyChange)>,
    published_to: Option<PathBuf>,
}

/// Orchestrates read → persist → publish and records the result.
pub struct SyncRunner {
    store: Arc<dyn ConfigStore>,
    reader: SourceReader,
    publisher: Publisher,
    state: SharedRunState,
}

impl SyncRunner {
    pub fn new(store: Arc<dyn ConfigStore>, reader: SourceReader, publisher: Publisher) -> Self {
        Self {
            store,
            reader,
            publisher,
            state: SharedRunState::new(),
        }
    }

    /// Shares an existing state record instead of a fresh one.
    pub fn with_state(mut self, state: SharedRunState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &SharedRunState {
        &self.state
    }

    /// Runs one attempt and records its outcome.
    pub async fn run_once(&self) -> SyncOutcome {
        let started_at = Utc::now();
        info!(source = %self.reader.dir().display(), "Sync job started");

        let mut progress = RunProgress {
            stage: SyncStage::Reading,
            changes: Vec::new(),
            published_to: None,
        };
        let result = self.execute(&mut progress).await;

        let (status, message, failed_stage) = match result {
            Ok(()) => {
                let keys: Vec<&str> = progress.changes.iter().map(|(k, _)| k.as_str()).collect();
                (
                    SyncStatus::Success,
                    format!("Sync completed: {}", keys.join(", ")),
                    None,
                )
            }
            Err(e) => {
                warn!(stage = progress.stage.as_str(), error = %e, "Sync failed");
                (SyncStatus::Failed, e.to_string(), Some(progress.stage))
            }
        };

        self.state.record(started_at, status, message.clone());

        let outcome = SyncOutcome {
            status,
            message,
            started_at,
            failed_stage,
            changes: progress.changes,
            published_to: progress.published_to,
        };
        if outcome.is_success() {
            let stats = outcome.stats();
            info!(
                created = stats.created,
                updated = stats.updated,
                unchanged = stats.unchanged,
                "Sync job finished"
            );
        }
        outcome
    }

    async fn execute(&self, progress: &mut RunProgress) -> Result<(), AppError> {
        let payloads = self.reader.read_all()?;

        progress.stage = SyncStage::Persisting;
        for key in ConfigKey::ALL {
            let change = self.persist(key, payloads.get(key)).await?;
            progress.changes.push((key, change));
        }

        progress.stage = SyncStage::Publishing;
        progress.published_to = self.publisher.publish(&payloads)?;

        progress.stage = SyncStage::Done;
        Ok(())
    }

    async fn persist(&self, key: ConfigKey, payload: &Payload) -> Result<KeyChange, AppError> {
        let new_hash = payload_hash(payload);
        let existing_hash = self
            .store
            .get(key.as_str())
            .await?
            .map(|entry| payload_hash(&entry.payload));

        self.store.upsert(key.as_str(), payload).await?;

        let change = classify_change(existing_hash.as_deref(), &new_hash);
        debug!(key = %key, change = ?change, "Persisted configuration");
        Ok(change)
    }
}
