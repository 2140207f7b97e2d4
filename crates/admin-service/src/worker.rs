//! Rebuild worker - runs one database rebuild at a time in the background

use anyhow::{anyhow, Result};
use facedb_common::{RebuildStatus, TriggerSource};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::engine::RebuildEngine;
use crate::store::{JobStore, TriggerOutcome};

/// Progress and message published before the engine encodes images
const ENCODING_PHASE: (u8, &str) = (20, "Processing face images...");

/// Progress and message published before the API reload
const RELOAD_PHASE: (u8, &str) = (70, "Notifying API server to reload database...");

/// Starts rebuild jobs and drives them to a terminal state
#[derive(Clone)]
pub struct RebuildWorker {
    store: JobStore,
    engine: Arc<dyn RebuildEngine>,
}

impl RebuildWorker {
    /// Create a new worker
    pub fn new(store: JobStore, engine: Arc<dyn RebuildEngine>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Start a rebuild unless one is already running
    ///
    /// Returns as soon as the job is initialised; the work itself runs on a
    /// spawned task.
    pub fn trigger(&self, triggered_by: TriggerSource) -> TriggerOutcome {
        let outcome = self.store.try_begin(triggered_by);

        match &outcome {
            TriggerOutcome::Started(_) => {
                info!("Rebuild started (triggered by {})", triggered_by);
                self.spawn();
            }
            TriggerOutcome::AlreadyRunning(job) => {
                info!(
                    "Rebuild requested by {} while one is running ({}), ignoring",
                    triggered_by, job.status
                );
            }
        }

        outcome
    }

    /// Run the job in the background; its result only lands in the store
    fn spawn(&self) {
        let store = self.store.clone();
        let engine = Arc::clone(&self.engine);

        tokio::spawn(async move {
            // Inner task so a panic in the engine still ends in `failed`
            let task_store = store.clone();
            let work = tokio::spawn(async move { execute(&task_store, engine.as_ref()).await });

            let result = match work.await {
                Ok(result) => result,
                Err(e) => Err(anyhow!("rebuild task aborted: {}", e)),
            };

            match result {
                Ok(message) => {
                    info!("Rebuild completed: {}", message);
                    store.update(|job| job.mark_completed(message));
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    error!("Rebuild failed: {}", reason);
                    store.update(|job| job.mark_failed(reason));
                }
            }
        });
    }
}

/// Run the engine phases, returning the completion message
async fn execute(store: &JobStore, engine: &dyn RebuildEngine) -> Result<String> {
    let triggered_by = store
        .read()
        .triggered_by
        .unwrap_or(TriggerSource::Manual);

    let (progress, message) = ENCODING_PHASE;
    store.update(|job| job.advance(RebuildStatus::Rebuilding, progress, message));

    let report = engine.build_database(triggered_by).await?;
    if let Some(log_file) = &report.log_file {
        info!("Rebuild log written to {}", log_file.display());
    }

    let (progress, message) = RELOAD_PHASE;
    store.update(|job| job.advance(RebuildStatus::Reloading, progress, message));

    // The database on disk is already rebuilt; a failed reload only
    // means the API keeps serving the old one until restarted.
    match engine.reload_database().await {
        Ok(report) => Ok(format!(
            "Database rebuilt successfully with {} identities",
            report.num_identities
        )),
        Err(e) => {
            warn!("Recognition API reload failed: {:#}", e);
            Ok(format!(
                "Database rebuilt but API reload failed: {}. Restart API server manually.",
                e
            ))
        }
    }
}
