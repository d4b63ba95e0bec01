// src/assembler.rs

use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use crate::error::{DownloadError, Result};
use crate::models::{Section, SectionPayload};

/// Writes `sections` into `destination` in ascending index order and returns
/// the number of bytes written.
///
/// The destination is created or truncated. Each section's buffer is dropped,
/// or its staging file removed, as soon as it has been copied. A failure
/// partway leaves the destination partially written.
#[instrument(skip(sections), fields(sections = sections.len()))]
pub async fn assemble(mut sections: Vec<Section>, destination: &Path) -> Result<u64> {
    sections.sort_by_key(|s| s.index);

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    let mut out = BufWriter::new(file);

    let mut written = 0u64;
    for section in sections {
        let index = section.index;
        written += match section.payload {
            SectionPayload::Memory(bytes) => {
                out.write_all(&bytes)
                    .await
                    .map_err(|e| DownloadError::io(destination, e))?;
                bytes.len() as u64
            }
            SectionPayload::Staged { path, .. } => {
                let copied = copy_staged(&path, &mut out, destination).await;
                // The staging file goes away once read, whether or not the copy succeeded.
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove staging file");
                }
                copied?
            }
        };
        debug!(section = index, written, "section merged");
    }

    out.flush()
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    out.into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    Ok(written)
}

async fn copy_staged(
    path: &Path,
    out: &mut BufWriter<File>,
    destination: &Path,
) -> Result<u64> {
    let mut staged = File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    tokio::io::copy(&mut staged, out)
        .await
        .map_err(|e| DownloadError::io(destination, e))
}
