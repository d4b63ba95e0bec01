// src/coordinator.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{DownloadError, Result};
use crate::fetcher::RangeSource;
use crate::models::{next_run_id, ByteRange, Section, SectionPayload, Staging};

/// How the fan-out reacts to the first failed section.
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    /// Abort in-flight siblings instead of letting them finish in the background.
    pub abort_on_failure: bool,
    /// External cancellation; `None` means the fan-out cannot be cancelled.
    pub cancel: Option<CancellationToken>,
}

/// Fetches every range concurrently, one task per range, and returns the
/// sections in range order.
///
/// The first failure, in completion order, is returned without waiting for
/// the remaining tasks. Those keep running detached and their results are
/// dropped, unless `policy.abort_on_failure` is set.
#[instrument(skip_all, fields(sections = ranges.len()))]
pub async fn fetch_all<S: RangeSource>(
    source: Arc<S>,
    ranges: &[ByteRange],
    staging: &Staging,
    destination: &Path,
    policy: &FetchPolicy,
) -> Result<Vec<Section>> {
    let run = next_run_id();
    let mut tasks = JoinSet::new();
    for (index, &range) in ranges.iter().enumerate() {
        let source = Arc::clone(&source);
        let staged_path = staging.path_for(destination, run, index);
        tasks.spawn(async move { fetch_section(source.as_ref(), index, range, staged_path).await });
    }

    let mut slots: Vec<Option<Section>> = std::iter::repeat_with(|| None).take(ranges.len()).collect();
    let cancelled = policy.cancel.clone().unwrap_or_default();

    loop {
        let next = tokio::select! {
            joined = tasks.join_next() => Some(joined),
            _ = cancelled.cancelled() => None,
        };
        let Some(joined) = next else {
            warn!("cancellation requested, aborting section tasks");
            tasks.abort_all();
            return Err(DownloadError::Cancelled);
        };
        let Some(joined) = joined else { break };

        let outcome = joined.map_err(DownloadError::from).and_then(|result| result);
        match outcome {
            Ok(section) => {
                debug!(section = section.index, bytes = section.payload.len(), "section complete");
                let index = section.index;
                slots[index] = Some(section);
            }
            Err(err) => {
                warn!(error = %err, in_flight = tasks.len(), "section failed, abandoning download");
                if policy.abort_on_failure {
                    tasks.abort_all();
                } else {
                    tasks.detach_all();
                }
                return Err(err);
            }
        }
    }

    // Every task reported success, so every slot is filled.
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                DownloadError::InvalidSpec(format!("section {index} produced no result"))
            })
        })
        .collect()
}

/// Fetches one range and stages it, either in memory or in its own file.
async fn fetch_section<S: RangeSource>(
    source: &S,
    index: usize,
    range: ByteRange,
    staged_path: Option<PathBuf>,
) -> Result<Section> {
    let bytes = source.fetch(index, range).await?;
    let payload = match staged_path {
        None => SectionPayload::Memory(bytes),
        Some(path) => {
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| DownloadError::io(&path, e))?;
            SectionPayload::Staged {
                path,
                len: bytes.len() as u64,
            }
        }
    };
    Ok(Section {
        index,
        range,
        payload,
    })
}
