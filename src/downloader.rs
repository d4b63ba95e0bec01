use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::assembler::assemble;
use crate::coordinator::{fetch_all, FetchPolicy};
use crate::error::{DownloadError, Result};
use crate::fetcher::{HttpSource, RangeSource, DEFAULT_USER_AGENT};
use crate::integrity::verify_sha256;
use crate::models::{DownloadReport, DownloadSpec, Staging};
use crate::planner::{plan, BoundaryConvention};

/// Everything about a download that is not part of its [`DownloadSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    pub user_agent: String,
    /// Applied to the probe and to each section request individually.
    pub timeout: Option<Duration>,
    pub staging: Staging,
    pub convention: BoundaryConvention,
    /// Hex SHA-256 the assembled file must match.
    pub expected_sha256: Option<String>,
    /// Abort in-flight sections once one has failed.
    pub abort_on_failure: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(Duration::from_secs(30)),
            staging: Staging::Memory,
            convention: BoundaryConvention::Inclusive,
            expected_sha256: None,
            abort_on_failure: false,
        }
    }
}

impl DownloadOptions {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DownloadError::InvalidSpec(format!("invalid download options: {e}")))
    }
}

/// Downloads single files over HTTP in concurrently fetched sections.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    options: DownloadOptions,
}

impl Downloader {
    /// Create a downloader with its own HTTP client.
    pub fn new(options: DownloadOptions) -> Result<Self> {
        let client = HttpSource::build_client(&options.user_agent)?;
        Ok(Self::with_client(client, options))
    }

    /// Create a downloader on an existing client. The client's own user agent wins.
    pub fn with_client(client: Client, options: DownloadOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Download `spec.url` into `spec.destination`.
    pub async fn run(&self, spec: &DownloadSpec) -> Result<DownloadReport> {
        let source = HttpSource::new(self.client.clone(), spec.url.clone(), self.options.timeout);
        download_from(Arc::new(source), spec, &self.options, None).await
    }

    /// Like [`Downloader::run`], stopping with [`DownloadError::Cancelled`] once `cancel` fires.
    pub async fn run_cancellable(
        &self,
        spec: &DownloadSpec,
        cancel: CancellationToken,
    ) -> Result<DownloadReport> {
        let source = HttpSource::new(self.client.clone(), spec.url.clone(), self.options.timeout);
        download_from(Arc::new(source), spec, &self.options, Some(cancel)).await
    }
}

/// Download with default options.
pub async fn download(spec: &DownloadSpec) -> Result<DownloadReport> {
    Downloader::new(DownloadOptions::default())?.run(spec).await
}

/// Probe, plan, fetch every section, then assemble. The first failure at any
/// stage ends the download.
#[instrument(skip(source, options, cancel), fields(url = %spec.url, sections = spec.sections))]
pub async fn download_from<S: RangeSource>(
    source: Arc<S>,
    spec: &DownloadSpec,
    options: &DownloadOptions,
    cancel: Option<CancellationToken>,
) -> Result<DownloadReport> {
    spec.validate()?;
    let started = Instant::now();
    let cancelled = cancel.clone().unwrap_or_default();

    info!("checking source size");
    let total_size = until_cancelled(&cancelled, source.probe_size()).await?;
    info!(total_size, "source size known");

    let ranges = plan(total_size, spec.sections, options.convention)?;
    debug!(?ranges, "planned sections");
    if cancelled.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let policy = FetchPolicy {
        abort_on_failure: options.abort_on_failure,
        cancel: cancel.clone(),
    };
    let sections = fetch_all(
        source,
        &ranges,
        &options.staging,
        &spec.destination,
        &policy,
    )
    .await?;

    // Range widths are not checked per section; the total catches short or
    // overlong bodies before anything reaches the destination.
    let received: u64 = sections.iter().map(|s| s.payload.len()).sum();
    if received != total_size {
        return Err(DownloadError::SizeMismatch {
            expected: total_size,
            actual: received,
        });
    }
    if cancelled.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let written = until_cancelled(&cancelled, assemble(sections, &spec.destination)).await?;

    let sha256 = match options.expected_sha256.as_deref() {
        Some(expected) => Some(
            until_cancelled(&cancelled, verify_sha256(&spec.destination, expected)).await?,
        ),
        None => None,
    };

    let elapsed = started.elapsed();
    info!(
        bytes = written,
        elapsed_ms = elapsed.as_millis() as u64,
        destination = %spec.destination.display(),
        "download complete"
    );
    Ok(DownloadReport {
        destination: spec.destination.clone(),
        total_bytes: written,
        sections: spec.sections,
        elapsed,
        sha256,
    })
}

/// Runs `work` unless `cancel` fires first, in which case `work` is dropped.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DownloadError::Cancelled),
        result = work => result,
    }
}
