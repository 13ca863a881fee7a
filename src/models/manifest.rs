use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload accepted by POST /api/v1/jobs.
///
/// `files` maps remote-relative source paths to the path each file should
/// have inside the produced package.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[garde(length(min = 1))]
    pub files: BTreeMap<String, String>,

    #[garde(length(min = 1))]
    pub profile_name: String,

    #[garde(length(min = 1))]
    pub package_name: String,
}

/// The immutable input to a job, serialized into the job row at submission
/// time and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManifest {
    pub files: BTreeMap<String, String>,
    pub profile_name: String,
    pub package_name: String,
}

impl JobManifest {
    /// A manifest that lost any of its parts between submission and claim
    /// cannot be processed.
    pub fn is_complete(&self) -> bool {
        !self.files.is_empty() && !self.profile_name.is_empty() && !self.package_name.is_empty()
    }

    /// Top-level path segment of the first manifest entry, used to mirror
    /// the remote layout when the package is pushed.
    pub fn base_directory(&self) -> Option<&str> {
        let first = self.files.keys().next()?;
        Some(first.split('/').next().unwrap_or(first))
    }
}

impl From<SubmitJobRequest> for JobManifest {
    fn from(req: SubmitJobRequest) -> Self {
        Self {
            files: req.files,
            profile_name: req.profile_name,
            package_name: req.package_name,
        }
    }
}
