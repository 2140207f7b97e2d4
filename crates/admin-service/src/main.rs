//! Admin Service
//!
//! REST API for the image library + background rebuild worker

use admin_service::{create_router, AppState, CommandEngine, Config, ImageLibrary};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting Admin Service");
    info!("Images root: {}", config.images_root.display());
    info!("Recognition API URL: {}", config.recognition_api_url);
    info!("Log directory: {}", config.log_dir.display());

    config
        .ensure_directories()
        .context("Failed to create directories")?;

    let engine = Arc::new(CommandEngine::new(config.engine_config()));

    let state = AppState::new(
        engine,
        ImageLibrary::new(config.images_root.clone()),
        config.log_dir.clone(),
        config.database_file.clone(),
    )
    .with_max_upload_bytes(config.max_upload_bytes());

    let app = create_router(state);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Admin Service API running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
