use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::models::job::{Job, JobState};
use crate::models::manifest::JobManifest;
use crate::services::pipeline::{PipelineError, TransferPipeline};
use crate::services::profiles::ProfileResolver;
use crate::services::store::{JobStore, StoreError};

/// Single-worker polling loop: claims the oldest pending job and drives it
/// through the transfer pipeline, one job at a time.
pub struct JobProcessor {
    store: Arc<JobStore>,
    resolver: ProfileResolver,
    pipeline: TransferPipeline,
    poll_interval: Duration,
}

impl JobProcessor {
    pub fn new(
        store: Arc<JobStore>,
        resolver: ProfileResolver,
        pipeline: TransferPipeline,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            resolver,
            pipeline,
            poll_interval,
        }
    }

    /// Poll loop; runs until the process shuts down. A store failure aborts
    /// only the current cycle — without durable storage no progress is
    /// possible, so the loop sleeps and re-polls.
    pub async fn run(self) {
        tracing::info!("job processor ready, starting poll loop");

        loop {
            match self.process_next().await {
                Ok(true) => {
                    tracing::debug!("job processed, checking for next job");
                }
                Ok(false) => {
                    tracing::trace!("no jobs pending, sleeping");
                    sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "job store unavailable, will retry");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Claim and execute one job. Returns Ok(false) when the queue is empty.
    ///
    /// Every job-level failure resolves the job to `failed` with an event
    /// describing the cause; only store errors escape to the caller.
    pub async fn process_next(&self) -> Result<bool, StoreError> {
        let job = match self.store.claim_next().await? {
            Some(job) => job,
            None => return Ok(false),
        };

        tracing::info!(job_id = job.id, "processing job");
        let started = Instant::now();

        let state = match self.execute(&job).await {
            Ok(archive) => {
                self.store
                    .append_event(job.id, &format!("Job completed: produced {}", archive.display()))
                    .await?;
                JobState::Completed
            }
            Err(reason) => {
                self.store
                    .append_event(job.id, &format!("Job failed: {reason}"))
                    .await?;
                JobState::Failed
            }
        };

        self.store.mark_terminal(job.id, state).await?;

        let elapsed = started.elapsed();
        metrics::histogram!("job_processing_seconds").record(elapsed.as_secs_f64());
        match state {
            JobState::Completed => {
                metrics::counter!("jobs_completed_total").increment(1);
                tracing::info!(job_id = job.id, elapsed_ms = elapsed.as_millis() as u64, "job completed");
            }
            _ => {
                metrics::counter!("jobs_failed_total").increment(1);
                tracing::warn!(job_id = job.id, elapsed_ms = elapsed.as_millis() as u64, "job failed");
            }
        }

        if let Ok(depth) = self.store.queue_depth().await {
            metrics::gauge!("queue_depth").set(depth as f64);
        }

        Ok(true)
    }

    async fn execute(&self, job: &Job) -> Result<PathBuf, ProcessError> {
        let manifest: JobManifest = serde_json::from_str(&job.manifest)?;
        if !manifest.is_complete() {
            return Err(ProcessError::ManifestIncomplete);
        }

        let profile = self
            .resolver
            .resolve(&manifest.profile_name)
            .ok_or_else(|| ProcessError::ProfileNotFound(manifest.profile_name.clone()))?;

        tracing::info!(
            job_id = job.id,
            profile = %profile.name,
            files = manifest.files.len(),
            package = %manifest.package_name,
            "starting transfer pipeline"
        );

        Ok(self.pipeline.run(job.id, &manifest, &profile).await?)
    }
}

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("malformed manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error("manifest incomplete: files, profile_name and package_name are all required")]
    ManifestIncomplete,

    #[error("no operation profile named `{0}`")]
    ProfileNotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
