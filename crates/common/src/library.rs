//! Wire types for the enrolled-person library and dashboard stats

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rebuild::RebuildJob;

/// `[name, image_count]` entry of `GET /api/identities`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary(pub String, pub usize);

impl IdentitySummary {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn image_count(&self) -> usize {
        self.1
    }
}

/// Response from `GET /api/person/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub images: Vec<String>,
    pub info: String,
}

/// Face database file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub exists: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Response from `GET /api/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_identities: usize,
    pub total_images: usize,
    pub database: DatabaseInfo,
    pub rebuild_status: RebuildJob,
}
