//! Client for the Admin Service rebuild API

use anyhow::{Context, Result};
use facedb_common::{RebuildJob, StatsResponse, TriggerRebuildResponse};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for interacting with the Admin Service
#[derive(Debug, Clone)]
pub struct AdminClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl AdminClient {
    /// Create a new admin client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current rebuild job record
    pub async fn rebuild_status(&self) -> Result<RebuildJob> {
        let url = format!("{}/api/rebuild_status", self.base_url);

        debug!("Fetching rebuild status: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch rebuild status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse rebuild status")
    }

    /// Ask the service to start a rebuild
    ///
    /// A rejection because a job is already running is returned as a
    /// response with `success: false`, not as an error.
    pub async fn trigger_rebuild(&self) -> Result<TriggerRebuildResponse> {
        let url = format!("{}/api/rebuild_db", self.base_url);

        debug!("Triggering rebuild: {}", url);

        let response = self.client.post(&url).send().await?;
        let status = response.status();

        if !status.is_success() && status != reqwest::StatusCode::CONFLICT {
            anyhow::bail!("Failed to trigger rebuild: {}", status);
        }

        response
            .json()
            .await
            .context("Failed to parse trigger response")
    }

    /// Dashboard counts plus the rebuild record
    pub async fn stats(&self) -> Result<StatsResponse> {
        let url = format!("{}/api/stats", self.base_url);

        debug!("Fetching stats: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch stats: {}", response.status());
        }

        response.json().await.context("Failed to parse stats")
    }

    /// Check if the service is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Health check failed: {}", e);
                return Ok(false);
            }
        };

        if !response.status().is_success() {
            return Ok(false);
        }

        let health: HealthResponse = response
            .json()
            .await
            .context("Failed to parse health response")?;

        Ok(health.status == "healthy")
    }
}
