//! Shared helpers for the integration test suites.
#![allow(dead_code)] // each test binary uses a subset of these helpers

use std::collections::BTreeMap;
use std::path::Path;

use sqlx::SqlitePool;
use tempfile::TempDir;

use dam_packer::db;
use dam_packer::models::manifest::JobManifest;

/// Fresh migrated SQLite database inside its own temp directory.
pub async fn setup_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
    let pool = db::init_pool(&url).await.expect("open database");
    db::run_migrations(&pool).await.expect("run migrations");
    (dir, pool)
}

pub fn manifest(files: &[(&str, &str)], profile_name: &str, package_name: &str) -> JobManifest {
    JobManifest {
        files: files
            .iter()
            .map(|(remote, local)| (remote.to_string(), local.to_string()))
            .collect::<BTreeMap<_, _>>(),
        profile_name: profile_name.to_string(),
        package_name: package_name.to_string(),
    }
}

/// Write a NAME/PATH_DOWN/PATH_UP profile file where the resolver will find it.
pub fn write_profile(profiles_dir: &Path, file: &str, name: &str, down: &Path, up: &Path) {
    let body = format!(
        "NAME={}\nPATH_DOWN={}\nPATH_UP={}\n",
        name,
        down.display(),
        up.display()
    );
    std::fs::write(profiles_dir.join(file), body).expect("write profile file");
}
