//! Configuration management for the admin service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,

    /// One sub-directory of images per enrolled person
    pub images_root: PathBuf,

    /// Where rebuild logs are written
    pub log_dir: PathBuf,

    /// Face database file produced by the engine
    pub database_file: PathBuf,

    /// Base URL of the recognition API
    pub recognition_api_url: String,

    /// Interpreter used to run the engine's `create-db` command
    pub rebuild_python: String,

    /// Engine entry script
    pub rebuild_script: PathBuf,

    /// Limit for one `create-db` run, 0 disables it
    pub rebuild_timeout_secs: u64,

    /// Limit for the reload call
    pub reload_timeout_secs: u64,

    /// Request body limit for uploads
    pub max_upload_mb: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            host: env::var("ADMIN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("ADMIN_PORT")
                .unwrap_or_else(|_| "5001".to_string())
                .parse()
                .context("Invalid ADMIN_PORT")?,

            images_root: env::var("IMAGES_ROOT")
                .unwrap_or_else(|_| "./server/data/celeb_images".to_string())
                .into(),

            log_dir: env::var("LOG_DIR")
                .unwrap_or_else(|_| "./logs".to_string())
                .into(),

            database_file: env::var("DATABASE_FILE")
                .unwrap_or_else(|_| "./server/data/face_db.pkl".to_string())
                .into(),

            recognition_api_url: env::var("RECOGNITION_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),

            rebuild_python: env::var("REBUILD_PYTHON").unwrap_or_else(|_| "python3".to_string()),

            rebuild_script: env::var("REBUILD_SCRIPT")
                .unwrap_or_else(|_| "./server/main.py".to_string())
                .into(),

            rebuild_timeout_secs: env::var("REBUILD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid REBUILD_TIMEOUT_SECS")?,

            reload_timeout_secs: env::var("RELOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RELOAD_TIMEOUT_SECS")?,

            max_upload_mb: env::var("MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "32".to_string())
                .parse()
                .context("Invalid MAX_UPLOAD_MB")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("ADMIN_PORT must be greater than 0");
        }

        if self.reload_timeout_secs == 0 {
            anyhow::bail!("RELOAD_TIMEOUT_SECS must be greater than 0");
        }

        if self.max_upload_mb == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be greater than 0");
        }

        if self.max_upload_mb.checked_mul(1024 * 1024).is_none() {
            anyhow::bail!("MAX_UPLOAD_MB is too large");
        }

        if !self.recognition_api_url.starts_with("http://")
            && !self.recognition_api_url.starts_with("https://")
        {
            anyhow::bail!("RECOGNITION_API_URL must be an http(s) URL");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Settings handed to the rebuild engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            python: self.rebuild_python.clone(),
            script: self.rebuild_script.clone(),
            images_root: self.images_root.clone(),
            log_dir: self.log_dir.clone(),
            recognition_api_url: self.recognition_api_url.trim_end_matches('/').to_string(),
            build_timeout: (self.rebuild_timeout_secs > 0)
                .then(|| Duration::from_secs(self.rebuild_timeout_secs)),
            reload_timeout: Duration::from_secs(self.reload_timeout_secs),
        }
    }

    /// Ensure the image root and log directory exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.images_root).with_context(|| {
            format!(
                "Failed to create images root: {}",
                self.images_root.display()
            )
        })?;

        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", self.log_dir.display()))?;

        if !self.rebuild_script.exists() {
            tracing::warn!(
                "Rebuild script does not exist: {}",
                self.rebuild_script.display()
            );
        }

        Ok(())
    }
}
