use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// The mechanism that moves bytes to and from remote storage.
///
/// Remote references are `<profile_name>:<path>`. Keeping this behind a
/// trait makes the concrete mechanism (CLI subprocess, SDK, HTTP) swappable
/// without touching the pipeline or the state machine, and lets tests
/// substitute a local-filesystem stub.
#[async_trait]
pub trait TransferTool: Send + Sync {
    /// Copy a remote object to a local path.
    async fn copy_to_local(&self, remote_ref: &str, local_path: &Path)
        -> Result<(), TransferError>;

    /// Copy a local file to a remote object.
    async fn copy_to_remote(
        &self,
        local_path: &Path,
        remote_ref: &str,
    ) -> Result<(), TransferError>;

    /// SHA-1 of a remote object as reported by the remote, if it reports one.
    async fn remote_digest(&self, remote_ref: &str) -> Result<Option<String>, TransferError>;
}

/// `TransferTool` backed by the rclone CLI.
pub struct RcloneTransferTool {
    binary: String,
}

impl RcloneTransferTool {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, TransferError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| TransferError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TransferError::Tool {
                command: format!("{} {}", self.binary, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl TransferTool for RcloneTransferTool {
    async fn copy_to_local(
        &self,
        remote_ref: &str,
        local_path: &Path,
    ) -> Result<(), TransferError> {
        let dest = local_path.to_string_lossy();
        self.run(&["copyto", remote_ref, &dest]).await?;
        Ok(())
    }

    async fn copy_to_remote(
        &self,
        local_path: &Path,
        remote_ref: &str,
    ) -> Result<(), TransferError> {
        let src = local_path.to_string_lossy();
        self.run(&["copyto", &src, remote_ref]).await?;
        Ok(())
    }

    async fn remote_digest(&self, remote_ref: &str) -> Result<Option<String>, TransferError> {
        let output = self.run(&["hashsum", "SHA1", remote_ref]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.split_whitespace().next().map(str::to_string))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Tool { command: String, stderr: String },
}
