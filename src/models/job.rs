use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a packaging job.
///
/// Transitions are monotonic: pending -> in_progress -> {completed, failed}.
/// Terminal rows are never touched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A packaging job as persisted in the `jobs` table.
///
/// The manifest is kept as the raw JSON it was submitted with; the processor
/// parses it on claim so a corrupt payload fails the job instead of the poll
/// loop.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub request_id: Option<i64>,
    pub manifest: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Append-only audit entry in a job's event log.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub id: i64,
    pub job_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_state_round_trips_through_snake_case() {
        assert_eq!(JobState::InProgress.to_string(), "in_progress");
        assert_eq!(JobState::from_str("in_progress").unwrap(), JobState::InProgress);
        assert_eq!(JobState::from_str("pending").unwrap(), JobState::Pending);
        assert!(JobState::from_str("in progress").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
    }
}
