// src/fetcher.rs

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{DownloadError, Result};
use crate::models::ByteRange;

/// Identifies every request this crate sends unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = "File Downloader";

/// A remote resource that can report its size and serve byte ranges.
///
/// The coordinator spawns one task per range, so implementations are shared
/// across tasks and their futures must be `Send`.
pub trait RangeSource: Send + Sync + 'static {
    /// Total size of the resource in bytes, without transferring the body.
    fn probe_size(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Bytes of `range`. `index` is the section index, used for error reporting.
    fn fetch(&self, index: usize, range: ByteRange) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches ranges of a single URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: String,
    timeout: Option<Duration>,
}

impl HttpSource {
    /// `timeout` bounds each request individually; there is no overall deadline.
    pub fn new(client: Client, url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Builds the client shared by the probe and every section request.
    pub fn build_client(user_agent: &str) -> Result<Client> {
        Ok(Client::builder().user_agent(user_agent).build()?)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn with_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

impl RangeSource for HttpSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn probe_size(&self) -> Result<u64> {
        let resp = self.with_timeout(self.client.head(&self.url)).send().await?;
        let status = resp.status();
        debug!(status = status.as_u16(), "probe response");
        if !status.is_success() {
            return Err(DownloadError::UnexpectedStatus {
                status: status.as_u16(),
                section: None,
            });
        }

        // Read the header directly: for HEAD responses the body length is zero.
        let header = resp
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| DownloadError::SizeUnavailable("no Content-Length header".into()))?;
        header
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                DownloadError::SizeUnavailable(format!("unparsable Content-Length {header:?}"))
            })
    }

    async fn fetch(&self, index: usize, range: ByteRange) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(&self.url)
            .header(RANGE, range.header_value());
        let resp = self.with_timeout(request).send().await?;

        // Anything but 206 means the server did not honour the range; a 200
        // would hand every section the whole file.
        let status = resp.status();
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::UnexpectedStatus {
                status: status.as_u16(),
                section: Some(index),
            });
        }

        // Content-Length is server-controlled; never reserve more than the range asks for.
        let capacity = resp.content_length().unwrap_or(0).min(range.width());
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|source| DownloadError::BodyRead {
                section: index,
                source,
            })?;
            body.extend_from_slice(&bytes);
        }

        debug!(section = index, %range, received = body.len(), "section body drained");
        Ok(body)
    }
}
