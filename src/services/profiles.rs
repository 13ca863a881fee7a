use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::profile::OperationProfile;

/// Looks up operation profiles stored as `KEY=VALUE` text files under a
/// configured directory. The directory is re-scanned on every lookup so
/// profile edits take effect without a restart.
pub struct ProfileResolver {
    profiles_dir: PathBuf,
}

impl ProfileResolver {
    pub fn new(profiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
        }
    }

    /// First profile whose NAME matches. An entry missing PATH_DOWN or
    /// PATH_UP is treated as not found rather than as an error.
    pub fn resolve(&self, name: &str) -> Option<OperationProfile> {
        for entry in WalkDir::new(&self.profiles_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("txt")
            {
                continue;
            }

            match parse_profile(entry.path()) {
                Some(profile) if profile.name == name => return Some(profile),
                _ => {}
            }
        }

        None
    }
}

fn parse_profile(path: &Path) -> Option<OperationProfile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable profile file");
            return None;
        }
    };

    let mut name = None;
    let mut download_path = None;
    let mut upload_path = None;

    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        match key.trim() {
            "NAME" => name = Some(value.trim().to_string()),
            "PATH_DOWN" => download_path = Some(PathBuf::from(value.trim())),
            "PATH_UP" => upload_path = Some(PathBuf::from(value.trim())),
            _ => {}
        }
    }

    match (name, download_path, upload_path) {
        (Some(name), Some(download_path), Some(upload_path)) => Some(OperationProfile {
            name,
            download_path,
            upload_path,
        }),
        _ => None,
    }
}
