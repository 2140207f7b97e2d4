//! Integration tests for the Admin Service API

use admin_service::engine::{BuildReport, ReloadReport};
use admin_service::{create_router, AppState, ImageLibrary, RebuildEngine};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use facedb_common::TriggerSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "facedb-test-boundary";

/// Engine that blocks each build until released
struct StubEngine {
    release: Notify,
    fail_with: Option<&'static str>,
}

#[async_trait]
impl RebuildEngine for StubEngine {
    async fn build_database(&self, _triggered_by: TriggerSource) -> Result<BuildReport> {
        self.release.notified().await;
        match self.fail_with {
            Some(message) => anyhow::bail!(message),
            None => Ok(BuildReport::default()),
        }
    }

    async fn reload_database(&self) -> Result<ReloadReport> {
        Ok(ReloadReport {
            success: true,
            num_identities: 2,
            error: None,
        })
    }
}

struct TestApp {
    router: Router,
    engine: Arc<StubEngine>,
    _dir: tempfile::TempDir,
}

/// Helper to create test app with a temporary library
fn create_test_app(fail_with: Option<&'static str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(StubEngine {
        release: Notify::new(),
        fail_with,
    });

    let state = AppState::new(
        engine.clone(),
        ImageLibrary::new(dir.path().join("celeb_images")),
        dir.path().join("logs"),
        dir.path().join("face_db.pkl"),
    );

    TestApp {
        router: create_router(state),
        engine,
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn trigger(app: &Router) -> (StatusCode, serde_json::Value) {
    send(
        app,
        Request::builder()
            .uri("/api/rebuild_db")
            .method("POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Poll the status endpoint the way the admin UI does
async fn poll_until_terminal(app: &Router) -> serde_json::Value {
    for _ in 0..500 {
        let (_, job) = get(app, "/api/rebuild_status").await;
        if job["status"] == "completed" || job["status"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("rebuild never reached a terminal state");
}

fn multipart(uri: &str, fields: &[(&str, &str)], files: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    for (name, file_name) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe0]);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri(uri)
        .method("POST")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(None);

    let (status, json) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "admin-service");
}

#[tokio::test]
async fn test_status_is_idle_before_any_job() {
    let app = create_test_app(None);

    let (status, job) = get(&app.router, "/api/rebuild_status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "idle");
    assert_eq!(job["is_running"], false);
    assert!(job["last_error"].is_null());
    assert!(job["triggered_by"].is_null());
}

#[tokio::test]
async fn test_trigger_then_poll_to_completion() {
    let app = create_test_app(None);

    let (status, json) = trigger(&app.router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Rebuild started");
    assert_eq!(json["status"]["is_running"], true);
    assert_eq!(json["status"]["status"], "rebuilding");
    assert_eq!(json["status"]["progress"], 0);
    assert_eq!(json["status"]["triggered_by"], "manual");

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["is_running"], true);
    assert_eq!(job["status"], "rebuilding");
    assert!(job["completed_at"].is_null());

    app.engine.release.notify_one();
    let done = poll_until_terminal(&app.router).await;

    assert_eq!(done["is_running"], false);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
    assert!(done["last_error"].is_null());
    assert!(done["completed_at"].is_string());
    assert_eq!(done["message"], "Database rebuilt successfully with 2 identities");
}

#[tokio::test]
async fn test_trigger_while_running_is_rejected() {
    let app = create_test_app(None);

    let (_, first) = trigger(&app.router).await;
    let started_at = first["status"]["started_at"].clone();

    let (status, second) = trigger(&app.router).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(second["success"], false);
    assert_eq!(second["error"], "Rebuild already in progress");
    assert_eq!(second["status"]["started_at"], started_at);

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["started_at"], started_at);
    assert_eq!(job["is_running"], true);

    app.engine.release.notify_one();
    poll_until_terminal(&app.router).await;
}

#[tokio::test]
async fn test_runner_failure_is_reported() {
    let app = create_test_app(Some("create-db exited with exit status: 2"));

    trigger(&app.router).await;
    app.engine.release.notify_one();
    let done = poll_until_terminal(&app.router).await;

    assert_eq!(done["is_running"], false);
    assert_eq!(done["status"], "failed");
    assert_eq!(done["last_error"], "create-db exited with exit status: 2");
    assert!(done["completed_at"].is_string());

    // A fresh trigger is accepted after a failure
    let (status, json) = trigger(&app.router).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["status"]["completed_at"].is_null());
    assert!(json["status"]["last_error"].is_null());

    app.engine.release.notify_one();
    poll_until_terminal(&app.router).await;
}

#[tokio::test]
async fn test_enroll_auto_rebuilds_once() {
    let app = create_test_app(None);

    let (status, json) = send(
        &app.router,
        multipart(
            "/api/enroll",
            &[("name", "Ada Lovelace"), ("info", "Mathematician")],
            &[("images", "ada1.jpg"), ("images", "ada2.png"), ("images", "notes.txt")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["images_saved"], 2);
    assert_eq!(json["rebuild_started"], true);
    assert_eq!(json["rebuild_message"], "Rebuild started");

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["triggered_by"], "enroll");

    // Second change while the first rebuild runs
    let (status, json) = send(
        &app.router,
        multipart(
            "/api/add_image",
            &[("person", "Ada Lovelace")],
            &[("image", "ada3.jpg")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rebuild_started"], false);
    assert_eq!(json["rebuild_message"], "Rebuild already in progress");

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["triggered_by"], "enroll");

    app.engine.release.notify_one();
    poll_until_terminal(&app.router).await;

    let (_, stats) = get(&app.router, "/api/stats").await;
    assert_eq!(stats["total_identities"], 1);
    assert_eq!(stats["total_images"], 3);
    assert_eq!(stats["database"]["exists"], false);
    assert_eq!(stats["rebuild_status"]["status"], "completed");
}

#[tokio::test]
async fn test_enroll_requires_name_and_images() {
    let app = create_test_app(None);

    let (status, json) = send(
        &app.router,
        multipart("/api/enroll", &[("name", "Ada")], &[]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "name and at least one image required");

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["status"], "idle");
}

#[tokio::test]
async fn test_enroll_rejects_traversal_name() {
    let app = create_test_app(None);

    let (status, json) = send(
        &app.router,
        multipart("/api/enroll", &[("name", "../escape")], &[("images", "a.jpg")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("invalid"));
}

#[tokio::test]
async fn test_dot_name_cannot_reach_library_root() {
    let app = create_test_app(None);

    send(
        &app.router,
        multipart(
            "/api/enroll",
            &[("name", "Ada"), ("auto_rebuild", "false")],
            &[("images", "ada.jpg")],
        ),
    )
    .await;

    let (status, json) = send(
        &app.router,
        multipart(
            "/api/delete_person",
            &[("person", "."), ("auto_rebuild", "false")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, _) = send(
        &app.router,
        multipart(
            "/api/enroll",
            &[("name", "."), ("auto_rebuild", "false")],
            &[("images", "root.jpg")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, identities) = get(&app.router, "/api/identities").await;
    assert_eq!(identities["identities"], serde_json::json!([["Ada", 1]]));

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["status"], "idle");
}

#[tokio::test]
async fn test_completed_at_is_stable_once_terminal() {
    let app = create_test_app(None);

    trigger(&app.router).await;
    app.engine.release.notify_one();
    let done = poll_until_terminal(&app.router).await;
    let completed_at = done["completed_at"].clone();
    assert!(completed_at.is_string());

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (_, job) = get(&app.router, "/api/rebuild_status").await;
        assert_eq!(job["completed_at"], completed_at);
        assert_eq!(job, done);

        let (_, stats) = get(&app.router, "/api/stats").await;
        assert_eq!(stats["rebuild_status"]["completed_at"], completed_at);
    }
}

#[tokio::test]
async fn test_library_browse_and_delete_without_rebuild() {
    let app = create_test_app(None);

    send(
        &app.router,
        multipart(
            "/api/enroll",
            &[("name", "Alan"), ("auto_rebuild", "false")],
            &[("images", "alan.jpg")],
        ),
    )
    .await;

    let (_, identities) = get(&app.router, "/api/identities").await;
    assert_eq!(identities["identities"], serde_json::json!([["Alan", 1]]));

    let (status, person) = get(&app.router, "/api/person/Alan").await;
    assert_eq!(status, StatusCode::OK);
    let image = person["images"][0].as_str().unwrap().to_string();
    assert!(image.ends_with("_alan.jpg"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/images/Alan/{}", image))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");

    let (status, json) = send(
        &app.router,
        multipart(
            "/api/delete_image",
            &[("person", "Alan"), ("filename", &image), ("auto_rebuild", "false")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.get("rebuild_started").is_none());

    let (status, _) = send(
        &app.router,
        multipart(
            "/api/delete_person",
            &[("person", "Alan"), ("auto_rebuild", "false")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = get(&app.router, "/api/person/Alan").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "person not found");

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["status"], "idle");
}

#[tokio::test]
async fn test_delete_person_triggers_rebuild() {
    let app = create_test_app(None);

    send(
        &app.router,
        multipart(
            "/api/enroll",
            &[("name", "Grace"), ("auto_rebuild", "false")],
            &[("images", "grace.jpg")],
        ),
    )
    .await;

    let (_, json) = send(
        &app.router,
        multipart("/api/delete_person", &[("person", "Grace")], &[]),
    )
    .await;
    assert_eq!(json["rebuild_started"], true);

    let (_, job) = get(&app.router, "/api/rebuild_status").await;
    assert_eq!(job["triggered_by"], "delete");

    app.engine.release.notify_one();
    poll_until_terminal(&app.router).await;
}

#[tokio::test]
async fn test_latest_log_without_logs() {
    let app = create_test_app(None);

    let (status, json) = get(&app.router, "/api/latest_log").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["content"], "No logs found");
}
