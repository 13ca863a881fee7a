use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::manifest::{JobManifest, SubmitJobRequest};
use crate::models::submission::{ErrorResponse, JobStatusResponse, SubmitJobResponse};

/// POST /api/v1/jobs — authenticate, validate, and enqueue a packaging job.
///
/// Every attempt is recorded in the request audit table, including rejected
/// ones; the row is patched with the response status on the way out.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), (StatusCode, Json<ErrorResponse>)> {
    let raw = serde_json::to_string(&payload).unwrap_or_default();

    let request_id = queries::insert_request(
        &state.db,
        header_str(&headers, "x-forwarded-for"),
        header_str(&headers, "user-agent"),
        "POST",
        "/api/v1/jobs",
        &raw,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "failed to record inbound request");
        internal_error()
    })?;

    if header_str(&headers, "x-api-key") != Some(state.api_key.as_str()) {
        finish_request(&state, request_id, StatusCode::FORBIDDEN).await;
        return Err(reject(StatusCode::FORBIDDEN, "not authorized"));
    }

    if let Err(report) = payload.validate() {
        finish_request(&state, request_id, StatusCode::BAD_REQUEST).await;
        return Err(reject(StatusCode::BAD_REQUEST, &report.to_string()));
    }

    let manifest = JobManifest::from(payload);
    let job_id = match state.store.enqueue(&manifest, Some(request_id)).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "failed to enqueue job");
            finish_request(&state, request_id, StatusCode::INTERNAL_SERVER_ERROR).await;
            return Err(internal_error());
        }
    };

    metrics::counter!("jobs_submitted_total").increment(1);
    if let Ok(depth) = state.store.queue_depth().await {
        metrics::gauge!("queue_depth").set(depth as f64);
    }

    finish_request(&state, request_id, StatusCode::CREATED).await;
    tracing::info!(job_id, request_id, "job submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id,
            message: "Job submitted successfully".to_string(),
        }),
    ))
}

/// GET /api/v1/jobs/{job_id} — job state, timestamps, and event log.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = state
        .store
        .get_job(job_id)
        .await
        .map_err(|e| {
            tracing::error!(job_id, error = %e, "failed to load job");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let events = state.store.events_for_job(job_id).await.map_err(|e| {
        tracing::error!(job_id, error = %e, "failed to load job events");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        state: job.state,
        created_at: job.created_at,
        start_time: job.start_time,
        end_time: job.end_time,
        events: events.into_iter().map(|e| e.message).collect(),
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn finish_request(state: &AppState, request_id: i64, status: StatusCode) {
    if let Err(e) = queries::set_request_status(&state.db, request_id, status.as_u16()).await {
        tracing::warn!(request_id, error = %e, "failed to record response status");
    }
}

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            message: message.to_string(),
        }),
    )
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    reject(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}
