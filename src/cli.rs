use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::adapters::{load_snapshot, write_json_atomic};
use crate::config::XsolConfig;
use crate::domain::{BatchResult, Source};
use crate::error::{Result, ScoutError};
use crate::extract::BatchExtractor;
use crate::services::XsolMetricsService;

#[derive(Parser)]
#[command(name = "yt-scout")]
#[command(version)]
#[command(about = "Yield-token listing extraction and analytics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory
    #[arg(short, long, default_value = "config", env = "YT_SCOUT_CONFIG_DIR")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run extraction passes at the configured interval
    Run,
    /// Run a single extraction pass and publish it
    Once,
    /// Extract one snapshot file and print the batch document
    Extract {
        /// Platform the snapshot was captured from (ratex | exponent)
        #[arg(short, long)]
        source: Source,
        /// Snapshot JSON written by the browser driver
        #[arg(long)]
        snapshot: PathBuf,
        /// Fixed batch timestamp (RFC 3339); defaults to now
        #[arg(long)]
        last_updated: Option<DateTime<Utc>>,
        /// Override the platform fee on recovered yield
        #[arg(long)]
        fee_rate: Option<f64>,
    },
    /// Fetch xSOL protocol metrics and print them
    Xsol {
        /// Also write the document to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Extract a single snapshot and print the document to stdout
pub async fn extract_snapshot(
    source: Source,
    snapshot: &Path,
    last_updated: Option<DateTime<Utc>>,
    fee_rate: Option<f64>,
) -> Result<BatchResult> {
    let loaded = load_snapshot(snapshot).await?;
    let last_updated = last_updated.unwrap_or_else(Utc::now);

    let mut extractor = BatchExtractor::new(source, last_updated);
    if let Some(fee) = fee_rate {
        if !(0.0..1.0).contains(&fee) {
            return Err(ScoutError::InvalidConfig(format!("fee rate must be in [0, 1): {fee}")));
        }
        extractor = extractor.with_fee_rate(fee);
    }
    let report = extractor.run(&loaded.dom);

    eprintln!(
        "{} matches, {} located, {} kept, {} dropped, {} missing cards",
        report.matches, report.located, report.kept, report.dropped_incomplete, report.cards_missing
    );

    let result = BatchResult::new(last_updated, report.records);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result)
}

/// Fetch protocol metrics, print them, optionally persist them
pub async fn show_xsol_metrics(config: &XsolConfig, output: Option<&Path>) -> Result<()> {
    let service = XsolMetricsService::new(config)?;
    let metrics = service.fetch().await?;

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    if let Some(path) = output {
        write_json_atomic(path, &metrics).await?;
        eprintln!("written to {}", path.display());
    }
    Ok(())
}
