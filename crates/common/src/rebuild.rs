//! Rebuild job record shared by the admin service and its clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message published when a job starts
pub const START_MESSAGE: &str = "Starting database rebuild...";

/// Phase of the rebuild job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStatus {
    /// No job has run since the service started
    Idle,
    /// The external engine is regenerating the database
    Rebuilding,
    /// The recognition API is being told to reload
    Reloading,
    /// Job finished successfully
    Completed,
    /// Job failed, see `last_error`
    Failed,
}

impl RebuildStatus {
    /// `completed` or `failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, RebuildStatus::Completed | RebuildStatus::Failed)
    }

    /// Phases in which `progress` is meaningful
    pub fn is_active(self) -> bool {
        matches!(self, RebuildStatus::Rebuilding | RebuildStatus::Reloading)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RebuildStatus::Idle => "idle",
            RebuildStatus::Rebuilding => "rebuilding",
            RebuildStatus::Reloading => "reloading",
            RebuildStatus::Completed => "completed",
            RebuildStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RebuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action that caused a rebuild to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Enroll,
    Delete,
    AddImage,
    DeleteImage,
    Manual,
}

impl TriggerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Enroll => "enroll",
            TriggerSource::Delete => "delete",
            TriggerSource::AddImage => "add_image",
            TriggerSource::DeleteImage => "delete_image",
            TriggerSource::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single rebuild job record
///
/// Optional fields serialize as `null` rather than being omitted; pollers
/// read `last_error: null` as "no error".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildJob {
    /// True strictly between start and a terminal state
    pub is_running: bool,

    /// 0-100, non-decreasing while the job is active
    pub progress: u8,

    /// Current phase
    pub status: RebuildStatus,

    /// Human-readable phase description
    pub message: String,

    /// When the job entered `rebuilding`
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached `completed` or `failed`
    pub completed_at: Option<DateTime<Utc>>,

    /// Error text, set only when `failed`
    pub last_error: Option<String>,

    /// What triggered the job
    pub triggered_by: Option<TriggerSource>,
}

impl Default for RebuildJob {
    fn default() -> Self {
        Self::idle()
    }
}

impl RebuildJob {
    /// The record as it exists before any job has run
    pub fn idle() -> Self {
        Self {
            is_running: false,
            progress: 0,
            status: RebuildStatus::Idle,
            message: String::new(),
            started_at: None,
            completed_at: None,
            last_error: None,
            triggered_by: None,
        }
    }

    /// Reset to the running start state of a fresh job
    pub fn begin(&mut self, triggered_by: TriggerSource) {
        *self = Self {
            is_running: true,
            progress: 0,
            status: RebuildStatus::Rebuilding,
            message: START_MESSAGE.to_string(),
            started_at: Some(Utc::now()),
            completed_at: None,
            last_error: None,
            triggered_by: Some(triggered_by),
        };
    }

    /// Move to a later phase. Progress never goes backwards.
    pub fn advance(&mut self, status: RebuildStatus, progress: u8, message: impl Into<String>) {
        self.status = status;
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
    }

    /// Mark the job as completed
    pub fn mark_completed(&mut self, message: impl Into<String>) {
        self.is_running = false;
        self.status = RebuildStatus::Completed;
        self.progress = 100;
        self.message = message.into();
        self.completed_at = Some(self.finish_time());
        self.last_error = None;
    }

    /// Mark the job as failed
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }

        self.is_running = false;
        self.status = RebuildStatus::Failed;
        self.progress = 0;
        self.message = format!("Database rebuild failed: {}", error);
        self.completed_at = Some(self.finish_time());
        self.last_error = Some(error);
    }

    // Clamped so a wall-clock step backwards cannot put completion before start.
    fn finish_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.started_at {
            Some(started) if started > now => started,
            _ => now,
        }
    }
}

/// Response from `POST /api/rebuild_db`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRebuildResponse {
    /// Whether a new job was started
    pub success: bool,

    /// Acknowledgement text on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Rejection reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Job record right after the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RebuildJob>,
}
