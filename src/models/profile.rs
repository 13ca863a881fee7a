use std::path::PathBuf;

/// Resolved routing information for a named remote.
///
/// Read fresh from the profiles directory for every job so edits take effect
/// without a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationProfile {
    pub name: String,
    pub download_path: PathBuf,
    pub upload_path: PathBuf,
}
