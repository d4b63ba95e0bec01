use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::{DownloadError, Result};

/// Compute the lowercase hex SHA-256 of a file asynchronously.
pub async fn sha256_sum(path: &Path) -> Result<String> {
    let file = File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 1024 * 8];
    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check `path` against an expected hex digest, ignoring case and surrounding whitespace.
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<String> {
    let actual = sha256_sum(path).await?;
    let expected = expected.trim().to_ascii_lowercase();
    if actual != expected {
        return Err(DownloadError::ChecksumMismatch { expected, actual });
    }
    Ok(actual)
}
