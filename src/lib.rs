//! Download a single file over HTTP as N byte-range sections fetched
//! concurrently, then reassemble them in order.
//!
//! ```no_run
//! # async fn demo() -> rangedl::error::Result<()> {
//! use rangedl::prelude::*;
//!
//! let spec = DownloadSpec::new("https://example.com/big.iso", "big.iso", 10);
//! let report = Downloader::new(DownloadOptions::default())?.run(&spec).await?;
//! println!("{} bytes in {:?}", report.total_bytes, report.elapsed);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod coordinator;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod integrity;
pub mod models;
pub mod planner;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::downloader::{download, DownloadOptions, Downloader};
    pub use crate::error::{DownloadError, Result};
    pub use crate::fetcher::{HttpSource, RangeSource};
    pub use crate::models::{ByteRange, DownloadReport, DownloadSpec, Staging};
    pub use crate::planner::{plan, BoundaryConvention};
}
