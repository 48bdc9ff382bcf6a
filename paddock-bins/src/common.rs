//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::{Context, Result};
use clap::Parser;
use paddock_core::engine::{BacktestReport, HistoricalFeed};
use paddock_core::{Config, StreamId};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Recorded feed files (one JSON array of market books per line)
    #[arg(short, long = "feed", required = true)]
    pub feeds: Vec<PathBuf>,

    /// Stream id the feeds are replayed under
    #[arg(long, default_value = "historical")]
    pub stream_id: String,

    /// Stake for the demo strategy
    #[arg(long, default_value = "2")]
    pub stake: Decimal,

    /// Log level (overridden by PADDOCK_LOG)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Write the final report here as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Load the configuration file, or defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Initialize tracing/logging from config and CLI overrides
pub fn init_logging(config: &Config, args: &CommonArgs) {
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    paddock_core::utils::init_logger(level, args.json_logs || config.logging.json);
}

/// Load every feed named on the command line
pub fn load_feeds(args: &CommonArgs) -> Result<Vec<HistoricalFeed>> {
    args.feeds
        .iter()
        .map(|path| HistoricalFeed::from_path(StreamId::new(&args.stream_id), path))
        .collect()
}

/// Flag set by Ctrl-C
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::warn!("Shutdown requested");
        flag.store(true, Ordering::Release);
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(shutdown)
}

/// Write the report as pretty JSON
pub fn write_report(report: &BacktestReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))
}

/// Print final statistics
pub fn print_stats(report: &BacktestReport) {
    tracing::info!("=== Final Statistics ===");
    tracing::info!("Snapshots processed: {}", report.snapshots_processed);
    tracing::info!("Snapshots skipped: {}", report.snapshots_skipped);
    tracing::info!("Packages executed: {}", report.packages_executed);
    tracing::info!("Markets settled: {}", report.markets.len());
    tracing::info!("Bets matched: {}", report.bet_count());
    tracing::info!("Profit: {}", report.total_profit());
    tracing::info!("Commission: {}", report.total_commission());
    tracing::info!("Net: {}", report.total_net());

    if !report.unsettled_markets.is_empty() {
        tracing::warn!("Markets never closed: {}", report.unsettled_markets.len());
    }
    if report.interrupted {
        tracing::warn!("Run was interrupted before the feeds ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_require_a_feed() {
        assert!(CommonArgs::try_parse_from(["paddock-backtest"]).is_err());
        let args =
            CommonArgs::try_parse_from(["paddock-backtest", "-f", "a.jsonl", "-f", "b.jsonl", "--stake", "5"])
                .unwrap();
        assert_eq!(args.feeds.len(), 2);
        assert_eq!(args.stream_id, "historical");
        assert_eq!(args.stake, Decimal::from(5));
    }

    #[test]
    fn test_report_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&BacktestReport::default(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: BacktestReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, BacktestReport::default());
    }
}
