use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use dam_packer::app_state::AppState;
use dam_packer::models::job::JobState;
use dam_packer::models::manifest::SubmitJobRequest;
use dam_packer::models::submission::{JobStatusResponse, SubmitJobResponse};
use dam_packer::routes;
use dam_packer::services::store::JobStore;

mod common;

const API_KEY: &str = "test-secret";

async fn setup_app() -> (tempfile::TempDir, AppState, Router) {
    let (dir, pool) = common::setup_db().await;
    let store = Arc::new(JobStore::new(pool.clone()));
    let state = AppState::new(pool, store, API_KEY);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/jobs", post(routes::jobs::submit_job))
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job_status))
        .with_state(state.clone());

    (dir, state, app)
}

fn sample_request() -> SubmitJobRequest {
    let mut files = BTreeMap::new();
    files.insert("album_01/clip.mp4".to_string(), "clip.mp4".to_string());
    files.insert("album_01/cover.jpg".to_string(), "art/cover.jpg".to_string());

    SubmitJobRequest {
        files,
        profile_name: "dist-07".to_string(),
        package_name: "order-12345".to_string(),
    }
}

fn submit(payload: &SubmitJobRequest, api_key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .header("x-api-key", api_key)
        .body(Body::from(serde_json::to_vec(payload).expect("serialize payload")))
        .expect("build request")
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body")
}

#[tokio::test]
async fn test_submit_enqueues_pending_job() {
    let (_dir, state, app) = setup_app().await;

    let response = app.oneshot(submit(&sample_request(), API_KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: SubmitJobResponse = body_json(response).await;
    let job = state
        .store
        .get_job(body.job_id)
        .await
        .unwrap()
        .expect("job persisted");

    assert_eq!(job.state, JobState::Pending);
    assert!(job.request_id.is_some(), "job row is linked to the request audit row");
    assert!(job.manifest.contains("album_01/clip.mp4"));
}

#[tokio::test]
async fn test_submit_rejects_bad_api_key() {
    let (_dir, state, app) = setup_app().await;

    let response = app.oneshot(submit(&sample_request(), "wrong")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(state.store.queue_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_submit_rejects_empty_files() {
    let (_dir, state, app) = setup_app().await;

    let mut payload = sample_request();
    payload.files.clear();

    let response = app.oneshot(submit(&payload, API_KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.store.queue_depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_submit_rejects_empty_package_name() {
    let (_dir, _state, app) = setup_app().await;

    let mut payload = sample_request();
    payload.package_name.clear();

    let response = app.oneshot(submit(&payload, API_KEY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_of_unknown_job_is_not_found() {
    let (_dir, _state, app) = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/jobs/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_projects_job_and_events() {
    let (_dir, state, app) = setup_app().await;

    let manifest = common::manifest(&[("a/x.txt", "x.txt")], "dist-07", "pkg");
    let job_id = state.store.enqueue(&manifest, None).await.unwrap();
    state.store.append_event(job_id, "Downloaded a/x.txt").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: JobStatusResponse = body_json(response).await;
    assert_eq!(body.job_id, job_id);
    assert_eq!(body.state, JobState::Pending);
    assert!(body.start_time.is_none());
    assert_eq!(body.events, vec!["Downloaded a/x.txt"]);
}

#[tokio::test]
async fn test_health_reports_ok() {
    let (_dir, _state, app) = setup_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
