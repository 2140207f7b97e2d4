//! In-memory holder for the single rebuild job record
//!
//! Every write goes through the watch channel's lock, so a reader cloning
//! the record never sees a half-applied update.

use facedb_common::{RebuildJob, TriggerSource};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Result of asking the store to start a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A fresh job was initialised; carries its start state
    Started(RebuildJob),
    /// A job is already running; carries that job, untouched
    AlreadyRunning(RebuildJob),
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TriggerOutcome::Started(_))
    }

    pub fn job(&self) -> &RebuildJob {
        match self {
            TriggerOutcome::Started(job) | TriggerOutcome::AlreadyRunning(job) => job,
        }
    }
}

/// Shared handle to the rebuild job record
#[derive(Clone)]
pub struct JobStore {
    tx: Arc<watch::Sender<RebuildJob>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// Create a store holding the idle record
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RebuildJob::idle());
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current record
    pub fn read(&self) -> RebuildJob {
        self.tx.borrow().clone()
    }

    /// Start a new job unless one is running; check and reset are one step
    pub fn try_begin(&self, triggered_by: TriggerSource) -> TriggerOutcome {
        let mut outcome = None;

        self.tx.send_if_modified(|job| {
            if job.is_running {
                outcome = Some(TriggerOutcome::AlreadyRunning(job.clone()));
                return false;
            }

            job.begin(triggered_by);
            outcome = Some(TriggerOutcome::Started(job.clone()));
            true
        });

        match outcome {
            Some(outcome) => outcome,
            // send_if_modified always runs the closure
            None => TriggerOutcome::AlreadyRunning(self.read()),
        }
    }

    /// Apply an update to the record
    pub(crate) fn update(&self, apply: impl FnOnce(&mut RebuildJob)) {
        self.tx.send_modify(|job| {
            apply(job);
            debug!(
                "Rebuild job: status={} progress={} message={:?}",
                job.status, job.progress, job.message
            );
        });
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<RebuildJob> {
        self.tx.subscribe()
    }
}
