// src/planner.rs

use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, Result};
use crate::models::ByteRange;

/// How the end offset of each section is computed from the per-section base size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryConvention {
    /// `end = start + base - 1`; the last section ends at `total - 1`.
    /// Every byte is requested exactly once and no request reaches past EOF.
    #[default]
    Inclusive,
    /// `end = start + base`; the last section ends at `total`.
    /// Non-last sections are one byte wider than `base` and the final request
    /// names one byte past EOF, which servers clamp.
    SizeAsEnd,
}

/// Splits `[0, total_size)` into `sections` contiguous, non-overlapping ranges.
///
/// The last range absorbs the remainder of `total_size / sections`.
pub fn plan(
    total_size: u64,
    sections: usize,
    convention: BoundaryConvention,
) -> Result<Vec<ByteRange>> {
    if sections == 0 {
        return Err(DownloadError::InvalidSpec(
            "section count must be positive".into(),
        ));
    }
    if total_size == 0 {
        return Err(DownloadError::InvalidSpec(
            "total size must be positive".into(),
        ));
    }
    let count = sections as u64;
    if count > total_size {
        return Err(DownloadError::InvalidSpec(format!(
            "{sections} sections for {total_size} bytes leaves empty sections"
        )));
    }

    let base = total_size / count;
    let (step, last_end) = match convention {
        BoundaryConvention::Inclusive => (base - 1, total_size - 1),
        BoundaryConvention::SizeAsEnd => (base, total_size),
    };

    let mut ranges: Vec<ByteRange> = Vec::with_capacity(sections);
    for i in 0..sections {
        let start = match ranges.last() {
            None => 0,
            Some(prev) => prev.end + 1,
        };
        let end = if i == sections - 1 { last_end } else { start + step };
        // SizeAsEnd widens every section by one byte; with too few bytes the
        // tail sections start at or past EOF.
        if end < start || start >= total_size {
            return Err(DownloadError::InvalidSpec(format!(
                "{sections} sections do not fit {total_size} bytes with {convention:?} boundaries"
            )));
        }
        ranges.push(ByteRange::new(start, end));
    }
    Ok(ranges)
}
