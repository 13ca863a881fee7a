use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::models::manifest::JobManifest;
use crate::models::profile::OperationProfile;
use crate::services::checksum;
use crate::services::store::JobStore;
use crate::services::transfer::{TransferError, TransferTool};

/// Executes the fetch -> archive -> push -> verify -> cleanup stages for one
/// claimed job.
///
/// Each job works inside a private directory keyed by its id, so the worker
/// count can grow without cross-job file collisions. The job store doubles
/// as the audit event sink; narrative events for every stage land in the
/// job's event log.
pub struct TransferPipeline {
    store: Arc<JobStore>,
    tool: Arc<dyn TransferTool>,
    work_root: PathBuf,
}

impl TransferPipeline {
    pub fn new(
        store: Arc<JobStore>,
        tool: Arc<dyn TransferTool>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            tool,
            work_root: work_root.into(),
        }
    }

    /// Drive all stages for one job, returning the local path of the pushed
    /// archive. The working directory is removed on every exit path.
    pub async fn run(
        &self,
        job_id: i64,
        manifest: &JobManifest,
        profile: &OperationProfile,
    ) -> Result<PathBuf, PipelineError> {
        let work_dir = self.work_root.join(format!("job-{job_id}"));
        let result = self.run_stages(job_id, manifest, profile, &work_dir).await;
        self.cleanup(job_id, &work_dir).await;
        result
    }

    async fn run_stages(
        &self,
        job_id: i64,
        manifest: &JobManifest,
        profile: &OperationProfile,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: work_dir.to_path_buf(),
                source,
            })?;

        self.fetch(job_id, manifest, profile, work_dir).await;

        let archive_name = format!("{}.zip", sanitize_file_name(&manifest.package_name));
        let archive_path = self.archive(job_id, &archive_name, work_dir).await?;

        let remote_ref = self
            .push(job_id, profile, manifest.base_directory(), &archive_path, &archive_name)
            .await?;

        self.verify(job_id, &remote_ref, &archive_path).await?;

        Ok(archive_path)
    }

    /// Best-effort copy of every manifest entry into the working directory.
    /// A failed file is logged and skipped; fetch never aborts the job.
    async fn fetch(
        &self,
        job_id: i64,
        manifest: &JobManifest,
        profile: &OperationProfile,
        work_dir: &Path,
    ) {
        for (remote_file, local_name) in &manifest.files {
            match self.fetch_one(profile, remote_file, local_name, work_dir).await {
                Ok(dest) => {
                    tracing::debug!(job_id, remote_file = %remote_file, "fetched file");
                    self.log_event(
                        job_id,
                        &format!("Downloaded {} to {}", remote_file, dest.display()),
                    )
                    .await;
                }
                Err(e) => {
                    tracing::warn!(job_id, remote_file = %remote_file, error = %e, "fetch failed");
                    self.log_event(job_id, &format!("Failed to download {remote_file}: {e}"))
                        .await;
                }
            }
        }
    }

    async fn fetch_one(
        &self,
        profile: &OperationProfile,
        remote_file: &str,
        local_name: &str,
        work_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let dest = work_dir.join(sanitized_relative(local_name));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let remote_ref = format!(
            "{}:{}",
            profile.name,
            profile.download_path.join(remote_file).display()
        );
        self.tool.copy_to_local(&remote_ref, &dest).await?;

        Ok(dest)
    }

    /// Walk the working directory into `<package_name>.zip` at its root.
    /// Entry names are relative to the working directory, preserving the
    /// manifest's local layout. Failure here aborts the pipeline; there is
    /// nothing meaningful to push.
    async fn archive(
        &self,
        job_id: i64,
        archive_name: &str,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let archive_path = work_dir.join(archive_name);

        let src_dir = work_dir.to_path_buf();
        let dest = archive_path.clone();
        tokio::task::spawn_blocking(move || write_archive(&src_dir, &dest))
            .await
            .map_err(|e| PipelineError::Archive(format!("archive task failed: {e}")))?
            .map_err(|e| PipelineError::Archive(e.to_string()))?;

        self.log_event(job_id, &format!("Archive completed: {}", archive_path.display()))
            .await;

        Ok(archive_path)
    }

    /// Transfer the archive to `<upload_path>/<base_dir>/<archive_name>` on
    /// the destination remote.
    async fn push(
        &self,
        job_id: i64,
        profile: &OperationProfile,
        base_dir: Option<&str>,
        archive_path: &Path,
        archive_name: &str,
    ) -> Result<String, PipelineError> {
        let mut remote_dir = profile.upload_path.clone();
        if let Some(base) = base_dir {
            remote_dir.push(base);
        }

        let remote_ref = format!("{}:{}", profile.name, remote_dir.join(archive_name).display());

        self.tool
            .copy_to_remote(archive_path, &remote_ref)
            .await
            .map_err(PipelineError::Push)?;

        self.log_event(
            job_id,
            &format!("Uploaded {} to {}", archive_path.display(), remote_ref),
        )
        .await;

        Ok(remote_ref)
    }

    /// Compare the local archive digest with the digest the remote reports
    /// for the uploaded object. A mismatch or a missing remote digest fails
    /// the job.
    async fn verify(
        &self,
        job_id: i64,
        remote_ref: &str,
        archive_path: &Path,
    ) -> Result<(), PipelineError> {
        let local = checksum::sha1_hex(archive_path)
            .await
            .map_err(|source| PipelineError::Digest {
                path: archive_path.to_path_buf(),
                source,
            })?;
        self.log_event(job_id, &format!("Local SHA1 checksum: {local}")).await;

        let remote = self
            .tool
            .remote_digest(remote_ref)
            .await
            .map_err(PipelineError::RemoteDigest)?;

        match remote {
            Some(remote) if remote == local => {
                self.log_event(job_id, "SHA1 checksum verification successful").await;
                Ok(())
            }
            Some(remote) => {
                self.log_event(
                    job_id,
                    &format!("SHA1 checksum verification failed: local {local}, remote {remote}"),
                )
                .await;
                Err(PipelineError::Verify(format!(
                    "checksum mismatch: local {local}, remote {remote}"
                )))
            }
            None => {
                self.log_event(
                    job_id,
                    &format!("No SHA1 checksum received from remote for {remote_ref}"),
                )
                .await;
                Err(PipelineError::Verify(format!(
                    "remote reported no checksum for {remote_ref}"
                )))
            }
        }
    }

    /// Remove the job's working directory. Failures are logged, never
    /// escalated.
    async fn cleanup(&self, job_id: i64, work_dir: &Path) {
        match tokio::fs::remove_dir_all(work_dir).await {
            Ok(()) => {
                self.log_event(
                    job_id,
                    &format!("Deleted working directory {}", work_dir.display()),
                )
                .await;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id, error = %e, "failed to clean working directory");
                self.log_event(
                    job_id,
                    &format!("Failed to delete working directory {}: {e}", work_dir.display()),
                )
                .await;
            }
        }
    }

    /// Event-log writes never abort a transfer; a failed append is logged
    /// and dropped.
    async fn log_event(&self, job_id: i64, message: &str) {
        if let Err(e) = self.store.append_event(job_id, message).await {
            tracing::warn!(job_id, error = %e, "failed to append job event");
        }
    }
}

fn write_archive(src_dir: &Path, archive_path: &Path) -> zip::result::ZipResult<()> {
    let file = std::fs::File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries: Vec<PathBuf> = WalkDir::new(src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p != archive_path)
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(".DS_Store"))
        .collect();
    // Sorted so identical contents always produce the same entry order.
    entries.sort();

    for path in entries {
        let Ok(rel) = path.strip_prefix(src_dir) else {
            continue;
        };
        let entry_name = rel.to_string_lossy().replace('\\', "/");

        writer.start_file(entry_name, options)?;
        let mut source = std::fs::File::open(&path)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}

/// Strip path separators and parent-dir segments from a manifest-supplied
/// name so it cannot escape the working directory.
fn sanitized_relative(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

fn sanitize_file_name(name: &str) -> String {
    sanitized_relative(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to prepare working directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive failed: {0}")]
    Archive(String),

    #[error("push failed: {0}")]
    Push(#[source] TransferError),

    #[error("failed to digest {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read remote checksum: {0}")]
    RemoteDigest(#[source] TransferError),

    #[error("verification failed: {0}")]
    Verify(String),
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tool(#[from] TransferError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_relative_strips_traversal() {
        assert_eq!(
            sanitized_relative("../../etc/passwd"),
            PathBuf::from("etc/passwd")
        );
        assert_eq!(
            sanitized_relative("sub/dir/file.txt"),
            PathBuf::from("sub/dir/file.txt")
        );
        assert_eq!(sanitized_relative("/abs/file.txt"), PathBuf::from("abs/file.txt"));
    }

    #[test]
    fn test_sanitize_file_name_flattens_separators() {
        assert_eq!(sanitize_file_name("order-12345"), "order-12345");
        assert_eq!(sanitize_file_name("a/b"), "a_b");
        assert_eq!(sanitize_file_name("../x"), "x");
    }

    fn fill_workdir(src: &Path) {
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("x.txt"), b"hello").unwrap();
        std::fs::write(src.join("sub/y.txt"), b"world").unwrap();
        std::fs::write(src.join(".DS_Store"), b"junk").unwrap();
    }

    fn entry_names(archive_path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(std::fs::File::open(archive_path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_write_archive_skips_itself_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("work");
        fill_workdir(&src);

        let archive_path = src.join("pkg.zip");
        write_archive(&src, &archive_path).unwrap();

        assert_eq!(
            entry_names(&archive_path),
            vec!["sub/y.txt".to_string(), "x.txt".to_string()]
        );
    }

    #[test]
    fn test_archiving_identical_contents_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = (dir.path().join("a"), dir.path().join("b"));
        fill_workdir(&a);
        fill_workdir(&b);

        let first = dir.path().join("first.zip");
        let second = dir.path().join("second.zip");
        write_archive(&a, &first).unwrap();
        write_archive(&b, &second).unwrap();

        assert_eq!(entry_names(&first), entry_names(&second));

        // Extracted contents must be byte-identical to the originals.
        use std::io::Read;
        for (archive_path, src) in [(&first, &a), (&second, &b)] {
            let mut archive =
                zip::ZipArchive::new(std::fs::File::open(archive_path).unwrap()).unwrap();
            for name in ["x.txt", "sub/y.txt"] {
                let mut bytes = Vec::new();
                archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
                assert_eq!(bytes, std::fs::read(src.join(name)).unwrap());
            }
        }
    }
}
