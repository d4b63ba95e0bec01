// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while planning, fetching or assembling a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download spec: {0}")]
    InvalidSpec(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// `section` is `None` for the size probe.
    #[error("unexpected status {status}{}", section_suffix(.section))]
    UnexpectedStatus { status: u16, section: Option<usize> },

    #[error("size unavailable: {0}")]
    SizeUnavailable(String),

    #[error("failed to read body of section {section}: {source}")]
    BodyRead {
        section: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("io error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("received {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("section task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("download cancelled")]
    Cancelled,
}

fn section_suffix(section: &Option<usize>) -> String {
    match section {
        Some(index) => format!(" for section {index}"),
        None => " for size probe".to_string(),
    }
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
