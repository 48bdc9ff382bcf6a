//! Backtest over recorded feeds
//!
//! Replays one or more JSON-lines recordings through the simulated exchange
//! with the demo `BackFavourite` strategy and prints the cleared summary.

use anyhow::Result;
use clap::Parser;
use paddock_bins::common::{
    init_logging, install_shutdown_handler, load_config, load_feeds, print_stats, write_report, CommonArgs,
};
use paddock_bins::strategies::BackFavourite;
use paddock_core::{BacktestEngine, StreamId};

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = CommonArgs::parse();
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    init_logging(&config, &args);

    tracing::info!("=== Paddock: Backtest ===");
    tracing::info!("Feeds: {}", args.feeds.len());

    let shutdown = install_shutdown_handler()?;
    let feeds = load_feeds(&args)?;

    let mut engine = BacktestEngine::new(&config).with_shutdown(shutdown);
    engine.add_strategy(BackFavourite::new(StreamId::new(&args.stream_id), args.stake));

    tracing::info!("Starting backtest...");
    let report = engine.run(&feeds)?;

    print_stats(&report);
    if let Some(path) = &args.output {
        write_report(&report, path)?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}
