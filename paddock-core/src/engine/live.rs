//! Live event loop
//!
//! Same dispatch as the backtest, but packages go to a `WorkerPool` talking
//! to a real `ExchangeClient` and time comes from the wall clock. Worker
//! results come back as `ExecutionEvent`s and are applied on this thread
//! before the next snapshot, so market state is only ever touched here.

use super::clock::wall_clock_ms;
use super::settlement::{clear_market, ClearedLogger, ClearedMarket, ClearedOrder, TracingLogger};
use super::strategy::{dispatch_book, Strategy};
use super::stream::HistoricalFeed;
use crate::config::Config;
use crate::core::{MarketId, PackageId, PaddockResult, StreamId};
use crate::data::{MarketBook, SnapshotValidator};
use crate::execution::{apply_execution_event, ExchangeClient, ExecutionEvent, PackageSink, PoolStats, WorkerPool};
use crate::markets::Markets;
use crate::order::OrderPackage;
use crate::transaction::TradingEnv;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source of live snapshots
pub trait MarketStream {
    fn stream_id(&self) -> &StreamId;

    /// Next update, or `None` once the stream has ended
    fn next_update(&mut self) -> PaddockResult<Option<Vec<MarketBook>>>;
}

/// Plays a recording back as if it were live
pub struct ReplayStream {
    feed: HistoricalFeed,
    position: usize,
}

impl ReplayStream {
    pub fn new(feed: HistoricalFeed) -> Self {
        Self { feed, position: 0 }
    }
}

impl MarketStream for ReplayStream {
    fn stream_id(&self) -> &StreamId {
        &self.feed.stream_id
    }

    fn next_update(&mut self) -> PaddockResult<Option<Vec<MarketBook>>> {
        let update = self.feed.updates.get(self.position).cloned();
        if update.is_some() {
            self.position += 1;
        }
        Ok(update)
    }
}

/// Remembers what was sent so worker events can be paired with it
struct TrackingSink<'a> {
    pool: &'a mut WorkerPool,
    in_flight: &'a mut HashMap<PackageId, OrderPackage>,
}

impl PackageSink for TrackingSink<'_> {
    fn submit(&mut self, package: OrderPackage) {
        self.in_flight.insert(package.id, package.clone());
        self.pool.submit(package);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveReport {
    pub markets: Vec<ClearedMarket>,
    pub orders: Vec<ClearedOrder>,
    pub snapshots_processed: u64,
    pub snapshots_skipped: u64,
    pub events_applied: u64,
    pub pool: PoolStats,
}

pub struct LiveEngine {
    markets: Markets,
    env: TradingEnv,
    pool: WorkerPool,
    in_flight: HashMap<PackageId, OrderPackage>,
    validator: SnapshotValidator,
    strategies: Vec<Box<dyn Strategy>>,
    logger: Box<dyn ClearedLogger>,
    settled: HashSet<MarketId>,
    shutdown: Arc<AtomicBool>,
    report: LiveReport,
}

impl LiveEngine {
    pub fn new(config: &Config, client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            markets: Markets::new(),
            env: TradingEnv::from_config(config),
            pool: WorkerPool::new(client, &config.live),
            in_flight: HashMap::new(),
            validator: SnapshotValidator::new(),
            strategies: Vec::new(),
            logger: Box::new(TracingLogger),
            settled: HashSet::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            report: LiveReport::default(),
        }
    }

    pub fn with_logger(mut self, logger: impl ClearedLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        info!(strategy = strategy.name(), "strategy added");
        self.strategies.push(Box::new(strategy));
    }

    /// Flag that stops `run` between updates
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn markets(&self) -> &Markets {
        &self.markets
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Consume `streams` round-robin until all have ended or shutdown is
    /// requested, then drain the pool
    pub fn run(&mut self, streams: &mut [Box<dyn MarketStream>]) -> PaddockResult<LiveReport> {
        info!(streams = streams.len(), strategies = self.strategies.len(), "live engine started");
        for strategy in self.strategies.iter_mut() {
            strategy.start();
        }

        let mut ended = vec![false; streams.len()];
        while ended.iter().any(|e| !e) && !self.shutdown.load(Ordering::Acquire) {
            for (index, stream) in streams.iter_mut().enumerate() {
                if ended[index] {
                    continue;
                }
                match stream.next_update()? {
                    Some(books) => {
                        let stream_id = stream.stream_id().clone();
                        self.process_update(&stream_id, &books)?;
                    }
                    None => {
                        debug!(stream_id = %stream.stream_id(), "stream ended");
                        ended[index] = true;
                    }
                }
            }
        }

        self.stop()
    }

    /// Apply pending worker results, then every snapshot of one update
    pub fn process_update(&mut self, stream_id: &StreamId, books: &[MarketBook]) -> PaddockResult<()> {
        self.apply_events()?;
        for book in books {
            self.process_book(stream_id, book)?;
        }
        Ok(())
    }

    /// Block until nothing is in flight or `timeout` elapses
    pub fn wait_for_in_flight(&mut self, timeout: Duration) -> PaddockResult<bool> {
        let deadline = Instant::now() + timeout;
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            if let Some(event) = self.pool.next_event(remaining) {
                self.apply_event(&event)?;
            }
        }
        Ok(true)
    }

    /// Drain the pool, run `finish` hooks and return the report
    pub fn stop(&mut self) -> PaddockResult<LiveReport> {
        for event in self.pool.shutdown() {
            self.apply_event(&event)?;
        }
        if !self.in_flight.is_empty() {
            warn!(packages = self.in_flight.len(), "packages never answered");
        }
        for strategy in self.strategies.iter_mut() {
            strategy.finish();
        }
        self.report.pool = self.pool.stats();
        info!(
            markets = self.report.markets.len(),
            events = self.report.events_applied,
            "live engine stopped"
        );
        Ok(std::mem::take(&mut self.report))
    }

    fn apply_events(&mut self) -> PaddockResult<()> {
        for event in self.pool.poll_events() {
            self.apply_event(&event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: &ExecutionEvent) -> PaddockResult<()> {
        let Some(package) = self.in_flight.remove(&event.package_id) else {
            warn!(package_id = %event.package_id, "event for unknown package");
            return Ok(());
        };
        let Some(market) = self.markets.get_mut(&event.market_id) else {
            debug!(package_id = %event.package_id, market_id = %event.market_id, "event for closed market");
            return Ok(());
        };
        apply_execution_event(market, &package, event, wall_clock_ms())?;
        self.report.events_applied += 1;
        Ok(())
    }

    fn process_book(&mut self, stream_id: &StreamId, book: &MarketBook) -> PaddockResult<()> {
        if self.settled.contains(&book.market_id) {
            return Ok(());
        }
        if let Err(err) = self.validator.validate(book) {
            warn!(market_id = %book.market_id, error = %err, "snapshot skipped");
            self.report.snapshots_skipped += 1;
            return Ok(());
        }
        let now_ms = wall_clock_ms();
        let market_id = book.market_id.clone();
        self.markets.apply(book.clone());
        self.report.snapshots_processed += 1;

        let market = self.markets.try_get_mut(&market_id)?;
        let mut sink = TrackingSink {
            pool: &mut self.pool,
            in_flight: &mut self.in_flight,
        };
        dispatch_book(&mut self.strategies, stream_id, market, &mut self.env, &mut sink, now_ms);

        if market.book().is_closed() {
            self.close_market(&market_id, now_ms)?;
        }
        Ok(())
    }

    fn close_market(&mut self, market_id: &MarketId, now_ms: u64) -> PaddockResult<()> {
        let market = self.markets.try_get_mut(market_id)?;
        market.settle(now_ms)?;
        let (cleared, orders) = clear_market(market, now_ms);
        self.logger.log_cleared_orders(&cleared, &orders);
        for strategy in self.strategies.iter_mut() {
            strategy.process_closed_market(market, &cleared);
        }
        self.markets.remove(market_id);
        self.validator.forget(market_id);
        self.settled.insert(market_id.clone());
        self.report.markets.push(cleared);
        self.report.orders.extend(orders);
        Ok(())
    }
}
