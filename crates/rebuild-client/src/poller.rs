//! Fixed-interval rebuild status poller
//!
//! Polls `GET /api/rebuild_status` until the job reaches `completed` or
//! `failed`, then refreshes the dashboard stats once. A failed poll is
//! logged and retried on the next tick.

use facedb_common::{RebuildJob, RebuildStatus, StatsResponse};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::AdminClient;

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Final state seen by a poller
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// Terminal job record
    pub job: RebuildJob,
    /// Stats fetched after the job finished, if that request succeeded
    pub stats: Option<StatsResponse>,
}

impl PollOutcome {
    pub fn succeeded(&self) -> bool {
        self.job.status == RebuildStatus::Completed
    }

    /// One-line user notification for the finished job
    pub fn notification(&self) -> String {
        if self.succeeded() {
            format!("Rebuild completed: {}", self.job.message)
        } else {
            format!(
                "Rebuild failed: {}",
                self.job.last_error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    client: AdminClient,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(client: AdminClient) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval (at least 1 ms)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the job is terminal
    ///
    /// `on_update` sees every successfully fetched record, including the
    /// terminal one.
    pub async fn run<F>(&self, mut on_update: F) -> PollOutcome
    where
        F: FnMut(&RebuildJob),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let job = loop {
            ticker.tick().await;

            match self.client.rebuild_status().await {
                Ok(job) => {
                    debug!("Rebuild {} at {}%", job.status, job.progress);
                    on_update(&job);
                    if job.status.is_terminal() {
                        break job;
                    }
                }
                Err(e) => {
                    warn!("Status poll failed, retrying: {:#}", e);
                }
            }
        };

        info!("Rebuild finished with status {}", job.status);

        let stats = match self.client.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Failed to refresh stats after rebuild: {:#}", e);
                None
            }
        };

        PollOutcome { job, stats }
    }

    /// Run the poll loop on a background task
    pub fn spawn<F>(self, on_update: F) -> PollHandle
    where
        F: FnMut(&RebuildJob) + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tokio::select! {
                outcome = self.run(on_update) => Some(outcome),
                // Fires on an explicit cancel and when the handle is dropped
                _ = &mut cancel_rx => {
                    debug!("Status poller cancelled");
                    None
                }
            }
        });

        PollHandle {
            cancel: Some(cancel_tx),
            task: Some(task),
        }
    }

    /// Start polling only if a job is already running, as on initial load
    pub async fn resume_if_running<F>(self, on_update: F) -> anyhow::Result<Option<PollHandle>>
    where
        F: FnMut(&RebuildJob) + Send + 'static,
    {
        let job = self.client.rebuild_status().await?;

        if !job.is_running {
            return Ok(None);
        }

        info!("Rebuild already running ({}%), watching", job.progress);
        Ok(Some(self.spawn(on_update)))
    }
}

/// Handle to a spawned poller; dropping it stops the poller
#[derive(Debug)]
pub struct PollHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Option<PollOutcome>>>,
}

impl PollHandle {
    /// Stop polling
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Wait for the poller to reach a terminal job
    ///
    /// Returns `None` if the poller was cancelled or its task died.
    pub async fn finished(mut self) -> Option<PollOutcome> {
        let task = self.task.take()?;

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Status poller task failed: {}", e);
                None
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
