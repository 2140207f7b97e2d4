//! API handlers for the admin service

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use facedb_common::{
    Error, IdentitySummary, PersonDetails, RebuildJob, StatsResponse, TriggerRebuildResponse,
    TriggerSource,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::RebuildEngine;
use crate::library::{ImageLibrary, Upload};
use crate::logs;
use crate::store::{JobStore, TriggerOutcome};
use crate::worker::RebuildWorker;

/// Default request body limit
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub jobs: JobStore,
    pub worker: RebuildWorker,
    pub library: ImageLibrary,
    pub log_dir: PathBuf,
    pub database_file: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the store, worker and library together
    pub fn new(
        engine: Arc<dyn RebuildEngine>,
        library: ImageLibrary,
        log_dir: PathBuf,
        database_file: PathBuf,
    ) -> Self {
        let jobs = JobStore::new();
        let worker = RebuildWorker::new(jobs.clone(), engine);

        Self {
            jobs,
            worker,
            library,
            log_dir,
            database_file,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            warn!("Request failed: {}", err);
        }

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError {
            status: err.status(),
            message: format!("invalid form data: {}", err.body_text()),
        }
    }
}

/// Response from the library mutation endpoints
#[derive(Debug, Serialize)]
pub struct LibraryChangeResponse {
    pub success: bool,

    pub message: String,

    pub person: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_saved: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Set when the request asked for an automatic rebuild
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_started: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_message: Option<String>,
}

impl LibraryChangeResponse {
    fn new(person: &str, message: String) -> Self {
        Self {
            success: true,
            message,
            person: person.to_string(),
            images_saved: None,
            filename: None,
            rebuild_started: None,
            rebuild_message: None,
        }
    }

    /// Trigger a rebuild on behalf of a library change
    fn auto_rebuild(mut self, state: &AppState, source: TriggerSource) -> Self {
        let (started, message) = match state.worker.trigger(source) {
            TriggerOutcome::Started(_) => (true, "Rebuild started"),
            TriggerOutcome::AlreadyRunning(_) => (false, "Rebuild already in progress"),
        };
        self.rebuild_started = Some(started);
        self.rebuild_message = Some(message.to_string());
        self
    }
}

/// Text fields and files of a multipart form
#[derive(Debug, Default)]
struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, Upload)>,
}

impl FormData {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await?;
                    if !file_name.is_empty() && !data.is_empty() {
                        form.files.push((
                            name,
                            Upload {
                                file_name,
                                data: data.to_vec(),
                            },
                        ));
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or("")
    }

    /// `auto_rebuild` defaults to on
    fn auto_rebuild(&self) -> bool {
        self.fields
            .get("auto_rebuild")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true)
    }

    fn take_files(&mut self, name: &str) -> Vec<Upload> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, upload)| upload).collect()
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "admin-service"
    }))
}

/// Start a manual rebuild
pub async fn rebuild_db_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.worker.trigger(TriggerSource::Manual) {
        TriggerOutcome::Started(job) => Json(TriggerRebuildResponse {
            success: true,
            message: Some("Rebuild started".to_string()),
            error: None,
            status: Some(job),
        })
        .into_response(),
        TriggerOutcome::AlreadyRunning(job) => (
            StatusCode::CONFLICT,
            Json(TriggerRebuildResponse {
                success: false,
                message: None,
                error: Some("Rebuild already in progress".to_string()),
                status: Some(job),
            }),
        )
            .into_response(),
    }
}

/// Current rebuild job record
pub async fn rebuild_status_handler(State(state): State<Arc<AppState>>) -> Json<RebuildJob> {
    Json(state.jobs.read())
}

/// Dashboard counts plus the rebuild record
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let identities = state.library.list_identities()?;

    Ok(Json(StatsResponse {
        total_identities: identities.len(),
        total_images: ImageLibrary::total_images(&identities),
        database: logs::database_info(&state.database_file),
        rebuild_status: state.jobs.read(),
    }))
}

/// List enrolled people
pub async fn identities_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identities: Vec<IdentitySummary> = state.library.list_identities()?;

    Ok(Json(serde_json::json!({ "identities": identities })))
}

/// One person's images and info
pub async fn person_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<PersonDetails>, ApiError> {
    Ok(Json(state.library.person(&name)?))
}

/// Raw image bytes
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    Path((person, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let path = state.library.image_path(&person, &filename)?;
    let data = tokio::fs::read(&path).await.map_err(Error::from)?;

    Ok(([(header::CONTENT_TYPE, content_type(&filename))], data).into_response())
}

/// Enroll a new person, optionally rebuilding afterwards
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LibraryChangeResponse>, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let name = form.text("name").to_string();
    let info = form.fields.get("info").cloned().unwrap_or_default();
    let images = form.take_files("images");

    if name.is_empty() || images.is_empty() {
        return Err(ApiError::bad_request("name and at least one image required"));
    }

    let saved = state.library.enroll(&name, &info, &images)?;
    info!("Enroll request for {}: {} of {} images saved", name, saved, images.len());

    let mut response =
        LibraryChangeResponse::new(&name, format!("Saved {} images for {}", saved, name));
    response.images_saved = Some(saved);

    if form.auto_rebuild() && saved > 0 {
        response = response.auto_rebuild(&state, TriggerSource::Enroll);
    }

    Ok(Json(response))
}

/// Add an image to an existing person
pub async fn add_image_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LibraryChangeResponse>, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let person = form.text("person").to_string();
    let image = form.take_files("image").into_iter().next();

    let Some(image) = image.filter(|_| !person.is_empty()) else {
        return Err(ApiError::bad_request("person and image required"));
    };

    let stored = state.library.add_image(&person, &image)?;

    let mut response = LibraryChangeResponse::new(&person, format!("Added image to {}", person));
    response.filename = Some(stored);

    if form.auto_rebuild() {
        response = response.auto_rebuild(&state, TriggerSource::AddImage);
    }

    Ok(Json(response))
}

/// Delete a person and their images
pub async fn delete_person_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LibraryChangeResponse>, ApiError> {
    let form = FormData::read(multipart).await?;
    let person = form.text("person").to_string();

    state.library.delete_person(&person)?;

    let mut response = LibraryChangeResponse::new(&person, format!("Deleted {}", person));

    if form.auto_rebuild() {
        response = response.auto_rebuild(&state, TriggerSource::Delete);
    }

    Ok(Json(response))
}

/// Delete a single image
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LibraryChangeResponse>, ApiError> {
    let form = FormData::read(multipart).await?;
    let person = form.text("person").to_string();
    let filename = form.text("filename").to_string();

    state.library.delete_image(&person, &filename)?;

    let mut response = LibraryChangeResponse::new(
        &person,
        format!("Deleted {} from {}", filename, person),
    );
    response.filename = Some(filename);

    if form.auto_rebuild() {
        response = response.auto_rebuild(&state, TriggerSource::DeleteImage);
    }

    Ok(Json(response))
}

/// Tail of the newest rebuild log
pub async fn latest_log_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let body = match logs::latest_log(&state.log_dir) {
        Ok(Some(tail)) => serde_json::json!({
            "content": tail.content,
            "filename": tail.filename
        }),
        Ok(None) => serde_json::json!({ "content": "No logs found" }),
        Err(e) => serde_json::json!({ "content": format!("Failed to read log: {}", e) }),
    };

    Json(body)
}

fn content_type(file_name: &str) -> &'static str {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
