use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::models::job::{Job, JobEvent, JobState};
use crate::models::manifest::JobManifest;

/// Durable FIFO job queue over SQLite.
///
/// All job mutations go through this type so the state machine stays
/// monotonic; callers never update rows directly.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new job in state `pending`, returning its id. Manifest
    /// content is not validated here; that is the intake layer's job.
    pub async fn enqueue(
        &self,
        manifest: &JobManifest,
        request_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let manifest_json = serde_json::to_string(manifest)?;

        let row = sqlx::query(
            r#"
            INSERT INTO jobs (request_id, manifest, status, created_at)
            VALUES (?1, ?2, 'pending', ?3)
            RETURNING id
            "#,
        )
        .bind(request_id)
        .bind(manifest_json)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Atomically claim the oldest pending job: move it to `in_progress`,
    /// stamp `start_time`, and return it. The single-statement UPDATE means
    /// two concurrent callers can never claim the same row. Returns `None`
    /// with no side effects when the queue is empty.
    pub async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'in_progress', start_time = ?1
            WHERE id = (
                SELECT id FROM jobs WHERE status = 'pending' ORDER BY id ASC LIMIT 1
            )
            RETURNING id, request_id, manifest, status, created_at, start_time, end_time
            "#,
        )
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(job_from_row).transpose()
    }

    /// Transition an in-progress job to `completed` or `failed` and stamp
    /// `end_time`. Any other starting state is rejected: terminal rows are
    /// immutable and pending rows must be claimed first.
    pub async fn mark_terminal(&self, job_id: i64, state: JobState) -> Result<(), StoreError> {
        if !state.is_terminal() {
            return Err(StoreError::InvalidTransition { job_id, to: state });
        }

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1, end_time = ?2
            WHERE id = ?3 AND status = 'in_progress'
            "#,
        )
        .bind(state.to_string())
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidTransition { job_id, to: state });
        }

        Ok(())
    }

    /// Append a free-text entry to a job's audit log.
    pub async fn append_event(&self, job_id: i64, message: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO events (job_id, message, created_at) VALUES (?1, ?2, ?3)")
            .bind(job_id)
            .bind(message)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetch one job by id.
    pub async fn get_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, request_id, manifest, status, created_at, start_time, end_time
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(job_from_row).transpose()
    }

    /// Event log for a job, oldest first.
    pub async fn events_for_job(&self, job_id: i64) -> Result<Vec<JobEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, job_id, message, created_at FROM events WHERE job_id = ?1 ORDER BY id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(JobEvent {
                    id: r.try_get("id")?,
                    job_id: r.try_get("job_id")?,
                    message: r.try_get("message")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Number of jobs still waiting to be claimed.
    pub async fn queue_depth(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS depth FROM jobs WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;

        let depth: i64 = row.try_get("depth")?;
        Ok(depth as u64)
    }
}

fn job_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Job, StoreError> {
    let status: String = row.try_get("status")?;
    let state =
        JobState::from_str(&status).map_err(|_| StoreError::UnknownState { state: status })?;

    Ok(Job {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        manifest: row.try_get("manifest")?,
        state,
        created_at: row.try_get("created_at")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("job {job_id} cannot transition to {to}: not in progress")]
    InvalidTransition { job_id: i64, to: JobState },

    #[error("job row carries unknown state `{state}`")]
    UnknownState { state: String },
}
