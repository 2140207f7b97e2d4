//! Admin Service
//!
//! Admin backend for the face database. Manages the enrolled-person image
//! library on disk and tracks the single asynchronous database rebuild
//! performed by the external recognition engine.
//!
//! ## Endpoints
//!
//! - `POST /api/rebuild_db` - Start a rebuild (409 if one is running)
//! - `GET /api/rebuild_status` - Current rebuild job record
//! - `GET /api/stats` - Library counts, database file, rebuild record
//! - `GET /api/identities` - Enrolled people with image counts
//! - `GET /api/person/{name}` - One person's images and info
//! - `GET /images/{person}/{filename}` - Image bytes
//! - `POST /api/enroll`, `/api/add_image`, `/api/delete_person`, `/api/delete_image`
//! - `GET /api/latest_log` - Tail of the newest rebuild log
//! - `GET /health` - Health check

pub mod config;
pub mod engine;
pub mod handlers;
pub mod library;
pub mod logs;
pub mod store;
pub mod worker;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use engine::{CommandEngine, EngineConfig, RebuildEngine};
pub use handlers::AppState;
pub use library::ImageLibrary;
pub use store::{JobStore, TriggerOutcome};
pub use worker::RebuildWorker;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Rebuild job
        .route("/api/rebuild_db", post(handlers::rebuild_db_handler))
        .route("/api/rebuild_status", get(handlers::rebuild_status_handler))
        .route("/api/stats", get(handlers::stats_handler))
        // Image library
        .route("/api/identities", get(handlers::identities_handler))
        .route("/api/person/{name}", get(handlers::person_handler))
        .route("/images/{person}/{filename}", get(handlers::image_handler))
        .route("/api/enroll", post(handlers::enroll_handler))
        .route("/api/add_image", post(handlers::add_image_handler))
        .route("/api/delete_person", post(handlers::delete_person_handler))
        .route("/api/delete_image", post(handlers::delete_image_handler))
        // Logs
        .route("/api/latest_log", get(handlers::latest_log_handler))
        .with_state(shared_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
