//! Router tests over in-memory backends.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use webmux_api::{create_router, ApiConfig, AppState};
use webmux_models::{Job, JobId, JobPatch, JobStatus, VideoId};
use webmux_queue::{JobStore, MemoryJobStore, MemoryNotificationBus, NotificationBus};

const CHANNEL: &str = "video-jobs";

struct TestApp {
    root: TempDir,
    store: MemoryJobStore,
    bus: MemoryNotificationBus,
    router: Router,
}

fn app() -> TestApp {
    let root = TempDir::new().unwrap();
    let store = MemoryJobStore::new();
    let bus = MemoryNotificationBus::new();
    let config = ApiConfig {
        mount_path: root.path().to_path_buf(),
        ..Default::default()
    };
    let state = AppState::with_backends(
        config,
        Arc::new(store.clone()),
        Arc::new(bus.clone()),
        CHANNEL,
    );
    TestApp {
        root,
        store,
        bus,
        router: create_router(state, None),
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve the router on an ephemeral local port.
async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn completed_job(app: &TestApp, job_id: &str, contents: &[u8]) -> Job {
    let mut job = Job::with_id(JobId::from_string(job_id), VideoId::from_trusted("abcdefghijk"));
    let output_path = format!("outputs/{}-abcdefghijk.webm", job_id);
    job.apply(
        JobStatus::Completed,
        JobPatch::completed(output_path.clone(), "Cool_Video_.webm"),
    );
    app.store.set(&job.job_id, &job).await.unwrap();

    let file = app.root.path().join(&output_path);
    tokio::fs::create_dir_all(file.parent().unwrap()).await.unwrap();
    tokio::fs::write(&file, contents).await.unwrap();
    job
}

#[tokio::test]
async fn generate_rejects_missing_or_invalid_video_id() {
    let app = app();

    for uri in ["/api/generate", "/api/generate?v=short", "/api/generate?v=abc.def.ghi"] {
        let response = send(&app.router, "POST", uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {}", uri);
    }
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn generate_stores_and_announces_job() {
    let app = app();
    let mut announcements = app.bus.subscribe(CHANNEL).await.unwrap();

    let response = send(&app.router, "POST", "/api/generate?v=abcdefghijk").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    let job_id = JobId::from_string(body["jobId"].as_str().unwrap());

    let job = app.store.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.video_id.as_str(), "abcdefghijk");

    let announcement = announcements.next().await.unwrap();
    assert_eq!(announcement.job_id, job_id);
    assert_eq!(announcement.video_id.as_str(), "abcdefghijk");
}

#[tokio::test]
async fn status_returns_record_or_404() {
    let app = app();
    let job = Job::with_id(JobId::from_string("j1"), VideoId::from_trusted("abcdefghijk"));
    app.store.set(&job.job_id, &job).await.unwrap();

    let response = send(&app.router, "GET", "/api/status/j1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["jobId"], "j1");
    assert_eq!(body["status"], "queued");

    let response = send(&app.router, "GET", "/api/status/unknown").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn download_requires_completed_job() {
    let app = app();
    let job = Job::with_id(JobId::from_string("j1"), VideoId::from_trusted("abcdefghijk"));
    app.store.set(&job.job_id, &job).await.unwrap();

    let response = send(&app.router, "GET", "/api/download/j1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app.router, "GET", "/api/download/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_streams_then_deletes_file() {
    let app = app();
    let contents = vec![7u8; 200 * 1024];
    let job = completed_job(&app, "j1", &contents).await;
    let file = app.root.path().join(job.output_path.as_deref().unwrap());

    let response = send(&app.router, "GET", "/api/download/j1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Cool_Video_.webm\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), contents.len());
    assert!(!file.exists());

    let response = send(&app.router, "GET", "/api/download/j1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_over_http_removes_file_after_last_byte() {
    let app = app();
    let contents = vec![3u8; 200 * 1024];
    let job = completed_job(&app, "j1", &contents).await;
    let file = app.root.path().join(job.output_path.as_deref().unwrap());
    let addr = serve(app.router.clone()).await;

    let response = reqwest::get(format!("http://{}/api/download/j1", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.content_length(), Some(contents.len() as u64));

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), contents.len());
    assert!(!file.exists());

    let response = reqwest::get(format!("http://{}/api/download/j1", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_of_empty_output_removes_file() {
    let app = app();
    let job = completed_job(&app, "j1", b"").await;
    let file = app.root.path().join(job.output_path.as_deref().unwrap());
    let addr = serve(app.router.clone()).await;

    let response = reqwest::get(format!("http://{}/api/download/j1", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(!file.exists());
}

#[tokio::test]
async fn download_missing_file_is_404() {
    let app = app();
    let job = completed_job(&app, "j1", b"data").await;
    tokio::fs::remove_file(app.root.path().join(job.output_path.unwrap()))
        .await
        .unwrap();

    let response = send(&app.router, "GET", "/api/download/j1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn probes_report_healthy() {
    let app = app();

    let response = send(&app.router, "GET", "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = send(&app.router, "GET", "/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["checks"]["store"]["status"], "ok");
}
