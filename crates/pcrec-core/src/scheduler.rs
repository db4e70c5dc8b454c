//! Periodic sync loop with on-demand triggers.
//!
//! The loop is a single tokio task. Between runs it waits on the interval
//! raced against a [`CancellationToken`], so [`SyncScheduler::stop`] takes
//! effect without waiting out the interval. A run already in progress is
//! allowed to finish.

use crate::config::SyncConfig;
use crate::models::SyncRunState;
use crate::sync::{SyncOutcome, SyncRunner};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct LoopHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Drives a [`SyncRunner`] on a fixed interval.
pub struct SyncScheduler {
    runner: Arc<SyncRunner>,
    enabled: bool,
    interval: Duration,
    handle: Mutex<LoopHandle>,
}

impl SyncScheduler {
    pub fn new(runner: Arc<SyncRunner>, config: &SyncConfig) -> Self {
        Self {
            runner,
            enabled: config.enabled,
            interval: config.interval(),
            handle: Mutex::new(LoopHandle {
                cancel: CancellationToken::new(),
                task: None,
            }),
        }
    }

    /// Overrides the configured interval (useful for testing).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoopHandle> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns the periodic loop on the current tokio runtime.
    ///
    /// Returns `false` if a loop is already running, including one that has
    /// been stopped but not yet reached its wait boundary.
    pub fn start(&self) -> bool {
        let mut handle = self.lock();
        if handle.task.as_ref().is_some_and(|task| !task.is_finished()) {
            warn!("Sync loop already running");
            return false;
        }

        let cancel = CancellationToken::new();
        handle.cancel = cancel.clone();
        handle.task = Some(tokio::spawn(run_loop(
            self.runner.clone(),
            self.enabled,
            self.interval,
            cancel,
        )));
        info!(
            enabled = self.enabled,
            interval_secs = self.interval.as_secs(),
            "Sync loop started"
        );
        true
    }

    /// Asks the loop to exit at its next wait boundary.
    ///
    /// Never blocks. Calling it repeatedly, or before [`start`](Self::start),
    /// is harmless.
    pub fn stop(&self) {
        self.lock().cancel.cancel();
    }

    /// Stops the loop and waits for the task to finish.
    pub async fn shutdown(&self) {
        let task = {
            let mut handle = self.lock();
            handle.cancel.cancel();
            handle.task.take()
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Sync loop task ended abnormally");
            }
        }
    }

    /// True while a loop task is alive and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        let handle = self.lock();
        !handle.cancel.is_cancelled()
            && handle.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Runs once right now, regardless of `enabled`.
    ///
    /// Not serialized against the periodic loop; both write the same state
    /// record and the last writer wins.
    pub async fn trigger_now(&self) -> SyncOutcome {
        info!("On-demand sync triggered");
        guarded_run(&self.runner).await
    }

    /// Snapshot of the last completed run.
    pub fn status(&self) -> SyncRunState {
        self.runner.state().snapshot()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    runner: Arc<SyncRunner>,
    enabled: bool,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if enabled {
            guarded_run(&runner).await;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("Sync loop stopped");
}

/// Runs once, converting a panic into a recorded failure so the loop
/// survives it.
async fn guarded_run(runner: &SyncRunner) -> SyncOutcome {
    match AssertUnwindSafe(runner.run_once()).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let now = Utc::now();
            let message = format!("Sync aborted: {}", panic_message(panic.as_ref()));
            error!(%message, "Sync run panicked");
            runner.state().record_failure(now, message.clone());
            SyncOutcome::aborted(now, message)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
