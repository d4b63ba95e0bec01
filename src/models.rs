// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{DownloadError, Result};

/// What to download, where to put it, and how many sections to split it into.
/// Immutable for the duration of one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSpec {
    pub url: String,
    pub destination: PathBuf,
    pub sections: usize,
}

impl DownloadSpec {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, sections: usize) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            sections,
        }
    }

    /// Rejects specs that can never succeed, before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.sections == 0 {
            return Err(DownloadError::InvalidSpec(
                "section count must be positive".into(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(DownloadError::InvalidSpec("source url is empty".into()));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(DownloadError::InvalidSpec("destination path is empty".into()));
        }
        Ok(())
    }
}

/// An inclusive byte interval `[start, end]` of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes the range asks for.
    pub fn width(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Where a fetched section waits between fetch completion and assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Staging {
    /// Keep every section in memory.
    #[default]
    Memory,
    /// Write every section to its own file. `None` means the destination's
    /// directory.
    Disk { dir: Option<PathBuf> },
}

impl Staging {
    /// Returns the staging file for section `index` of run `run`, or `None`
    /// for in-memory staging.
    ///
    /// e.g. for "/data/file.zip", section 3 of run 0 in process 4242 is
    /// "/data/.file.zip.4242-0.section-3.odm-part"
    pub fn path_for(&self, destination: &Path, run: u64, index: usize) -> Option<PathBuf> {
        let Staging::Disk { dir } = self else {
            return None;
        };
        let dir = match dir {
            Some(dir) => dir.clone(),
            None => destination
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        Some(dir.join(format!(
            ".{}.{}-{}.section-{}.odm-part",
            name,
            std::process::id(),
            run,
            index
        )))
    }
}

static NEXT_RUN: AtomicU64 = AtomicU64::new(0);

/// A run id unique within this process, keeping staging files of concurrent
/// downloads apart.
pub fn next_run_id() -> u64 {
    NEXT_RUN.fetch_add(1, Ordering::Relaxed)
}

/// The bytes of one fetched section.
#[derive(Debug)]
pub enum SectionPayload {
    Memory(Vec<u8>),
    Staged { path: PathBuf, len: u64 },
}

impl SectionPayload {
    pub fn len(&self) -> u64 {
        match self {
            SectionPayload::Memory(bytes) => bytes.len() as u64,
            SectionPayload::Staged { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A successfully fetched section, keyed by its index in the plan.
#[derive(Debug)]
pub struct Section {
    pub index: usize,
    pub range: ByteRange,
    pub payload: SectionPayload,
}

/// Outcome of a completed download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    pub destination: PathBuf,
    pub total_bytes: u64,
    pub sections: usize,
    pub elapsed: Duration,
    pub sha256: Option<String>,
}
