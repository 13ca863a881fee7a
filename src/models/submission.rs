use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::JobState;

/// Response body for POST /api/v1/jobs.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: i64,
    pub message: String,
}

/// Response body for GET /api/v1/jobs/{job_id} — a read-only projection of
/// the job row and its event log.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: i64,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub events: Vec<String>,
}

/// Error body returned by the intake endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
