//! Adapter for the external recognition engine
//!
//! The engine regenerates the face database through its `create-db`
//! command line and serves it from a separate API process that has to be
//! told to reload.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use facedb_common::TriggerSource;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Work delegated to the recognition engine during a rebuild
#[async_trait]
pub trait RebuildEngine: Send + Sync {
    /// Regenerate the face database from the image library
    async fn build_database(&self, triggered_by: TriggerSource) -> Result<BuildReport>;

    /// Ask the recognition API to load the regenerated database
    async fn reload_database(&self) -> Result<ReloadReport>;
}

/// Outcome of a successful `create-db` run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Log file holding the command output
    pub log_file: Option<PathBuf>,
}

/// Body of the recognition API's reload response
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadReport {
    pub success: bool,

    #[serde(default)]
    pub num_identities: usize,

    #[serde(default)]
    pub error: Option<String>,
}

/// Settings for [`CommandEngine`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interpreter that runs the engine script
    pub python: String,

    /// Engine entry script
    pub script: PathBuf,

    /// Image library passed as `--root`
    pub images_root: PathBuf,

    /// Directory for per-run logs
    pub log_dir: PathBuf,

    /// Recognition API base URL, without trailing slash
    pub recognition_api_url: String,

    /// Upper bound for one `create-db` run
    pub build_timeout: Option<Duration>,

    /// Upper bound for the reload call
    pub reload_timeout: Duration,
}

/// Engine reached through its command line and HTTP API
pub struct CommandEngine {
    config: EngineConfig,
    http_client: reqwest::Client,
}

impl CommandEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn command_line(&self) -> Vec<String> {
        vec![
            self.config.python.clone(),
            self.config.script.display().to_string(),
            "create-db".to_string(),
            "--root".to_string(),
            self.config.images_root.display().to_string(),
        ]
    }
}

#[async_trait]
impl RebuildEngine for CommandEngine {
    async fn build_database(&self, triggered_by: TriggerSource) -> Result<BuildReport> {
        if !self.config.script.exists() {
            anyhow::bail!("Main script not found: {}", self.config.script.display());
        }

        let argv = self.command_line();
        info!("Running create-db: {}", argv.join(" "));

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", argv[0]))?;

        let output = match self.config.build_timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => anyhow::bail!(
                    "Database rebuild timed out after {} seconds",
                    limit.as_secs()
                ),
            },
            None => child.wait_with_output().await,
        }
        .context("Failed to collect create-db output")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let log_file = self
            .config
            .log_dir
            .join(format!("rebuild_{}.log", Utc::now().timestamp()));
        let log_text = format!(
            "Triggered by: {}\nTime: {}\nCommand: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            triggered_by,
            Utc::now().to_rfc3339(),
            argv.join(" "),
            stdout,
            stderr
        );

        let log_file = match tokio::fs::write(&log_file, log_text).await {
            Ok(()) => Some(log_file),
            Err(e) => {
                warn!("Failed to write rebuild log {}: {}", log_file.display(), e);
                None
            }
        };

        if !output.status.success() {
            let detail = stderr.trim();
            if detail.is_empty() {
                anyhow::bail!("create-db exited with {}", output.status);
            }
            anyhow::bail!("create-db exited with {}: {}", output.status, detail);
        }

        Ok(BuildReport { log_file })
    }

    async fn reload_database(&self) -> Result<ReloadReport> {
        let url = format!("{}/api/database/reload", self.config.recognition_api_url);

        let response = match self
            .http_client
            .post(&url)
            .timeout(self.config.reload_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() => anyhow::bail!("API server not reachable"),
            Err(e) => return Err(e).context("Reload request failed"),
        };

        if !response.status().is_success() {
            anyhow::bail!("API returned status {}", response.status().as_u16());
        }

        let report: ReloadReport = response
            .json()
            .await
            .context("Failed to parse reload response")?;

        if !report.success {
            anyhow::bail!(
                "{}",
                report
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string())
            );
        }

        Ok(report)
    }
}
