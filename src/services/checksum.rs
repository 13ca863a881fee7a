use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 8192;

/// Streaming SHA-1 of a local file, lower-hex encoded.
///
/// SHA-1 matches what the transfer tool's `hashsum SHA1` reports for the
/// uploaded object, which is what the verify stage compares against.
pub async fn sha1_hex(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
