// src/main.rs

use anyhow::{bail, Context, Result};
use clap::Parser;
use rangedl::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Download a file over HTTP in concurrently fetched byte-range sections.
#[derive(Debug, Parser)]
#[command(name = "rangedl", version)]
struct Cli {
    /// URL of the file to download
    url: String,

    /// Output path; defaults to the last segment of the URL
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of sections fetched in parallel
    #[arg(short = 'n', long, default_value_t = 10)]
    sections: usize,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    user_agent: Option<String>,

    /// Stage sections as files in this directory instead of memory
    #[arg(long)]
    stage_dir: Option<PathBuf>,

    /// Expected SHA-256 of the finished file
    #[arg(long)]
    sha256: Option<String>,

    /// Use `end = start + size / n` section boundaries
    #[arg(long)]
    legacy_ranges: bool,

    /// Abort the other sections as soon as one fails
    #[arg(long)]
    abort_on_failure: bool,

    /// JSON file with download options; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the download report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn options(&self) -> Result<DownloadOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                DownloadOptions::from_json(&json)?
            }
            None => DownloadOptions::default(),
        };
        if let Some(secs) = self.timeout_secs {
            options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(agent) = &self.user_agent {
            options.user_agent = agent.clone();
        }
        if let Some(dir) = &self.stage_dir {
            options.staging = Staging::Disk {
                dir: Some(dir.clone()),
            };
        }
        if self.sha256.is_some() {
            options.expected_sha256 = self.sha256.clone();
        }
        if self.legacy_ranges {
            options.convention = BoundaryConvention::SizeAsEnd;
        }
        options.abort_on_failure |= self.abort_on_failure;
        Ok(options)
    }

    fn destination(&self) -> Result<PathBuf> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let name = self
            .url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty());
        match name {
            Some(name) => Ok(PathBuf::from(name)),
            None => bail!("cannot derive a file name from {}, pass --output", self.url),
        }
    }
}

fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rangedl=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let spec = DownloadSpec::new(cli.url.clone(), cli.destination()?, cli.sections);
    let downloader = Downloader::new(cli.options()?)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received, cancelling download");
                cancel.cancel();
            }
        }
    });

    let report = downloader
        .run_cancellable(&spec, cancel)
        .await
        .with_context(|| format!("downloading {}", spec.url))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Download completed in {} seconds",
            report.elapsed.as_secs_f64()
        );
    }
    Ok(())
}
