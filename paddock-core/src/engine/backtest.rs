//! Backtest event loop
//!
//! ```text
//!   Idle ──run()──► Streaming ──feeds exhausted──► Draining ──► Idle
//! ```
//!
//! Streaming, per snapshot, in replay order:
//!
//! 1. validate (invalid snapshots are skipped with a warning)
//! 2. advance the virtual clock to the publish time
//! 3. apply the snapshot to its market
//! 4. execute queued packages whose simulated delay has elapsed
//! 5. runner analytics and matching of resting orders
//! 6. subscribed strategies
//! 7. on a closed snapshot: settle, clear, notify, evict
//!
//! Feeds replayed one after another may go back in time, so the clock
//! restarts at each replay group. Packages still queued when a group ends
//! are executed against the last known book before the restart.
//!
//! Draining executes whatever is still queued against the last known book
//! of each market, then runs every strategy's `finish` hook.
//!
//! Everything is single-threaded and driven only by the data, so two runs
//! over the same feeds produce the same report.

use super::clock::VirtualClock;
use super::settlement::{clear_market, ClearedLogger, ClearedMarket, ClearedOrder, TracingLogger};
use super::strategy::{dispatch_book, Strategy};
use super::stream::{replay_order, HistoricalFeed};
use crate::config::Config;
use crate::core::{MarketId, PaddockResult, StreamId};
use crate::data::{MarketBook, SnapshotValidator};
use crate::execution::{SimulatedExchange, SimulatedQueue};
use crate::markets::Markets;
use crate::order::OrderPackage;
use crate::simulation::{MatchingEngine, SimulationMiddleware};
use crate::transaction::TradingEnv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Streaming,
    Draining,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "IDLE"),
            EngineState::Streaming => write!(f, "STREAMING"),
            EngineState::Draining => write!(f, "DRAINING"),
        }
    }
}

/// Result of one backtest run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub markets: Vec<ClearedMarket>,
    pub orders: Vec<ClearedOrder>,
    pub snapshots_processed: u64,
    pub snapshots_skipped: u64,
    pub packages_executed: u64,
    /// Markets still open when the feeds ran out
    pub unsettled_markets: Vec<MarketId>,
    pub interrupted: bool,
}

impl BacktestReport {
    pub fn total_profit(&self) -> Decimal {
        self.markets.iter().map(|m| m.profit).sum()
    }

    pub fn total_commission(&self) -> Decimal {
        self.markets.iter().map(|m| m.commission).sum()
    }

    pub fn total_net(&self) -> Decimal {
        self.markets.iter().map(|m| m.net).sum()
    }

    pub fn bet_count(&self) -> usize {
        self.markets.iter().map(|m| m.bet_count).sum()
    }
}

pub struct BacktestEngine {
    state: EngineState,
    clock: VirtualClock,
    markets: Markets,
    env: TradingEnv,
    queue: SimulatedQueue,
    exchange: SimulatedExchange,
    middleware: SimulationMiddleware,
    validator: SnapshotValidator,
    strategies: Vec<Box<dyn Strategy>>,
    logger: Box<dyn ClearedLogger>,
    settled: HashSet<MarketId>,
    shutdown: Option<Arc<AtomicBool>>,
    report: BacktestReport,
}

impl BacktestEngine {
    pub fn new(config: &Config) -> Self {
        let engine = MatchingEngine::new(config.client.min_bsp_liability);
        Self {
            state: EngineState::Idle,
            clock: VirtualClock::new(),
            markets: Markets::new(),
            env: TradingEnv::from_config(config),
            queue: SimulatedQueue::new(config.simulation.clone()),
            exchange: SimulatedExchange::new(engine),
            middleware: SimulationMiddleware::new(engine),
            validator: SnapshotValidator::new(),
            strategies: Vec::new(),
            logger: Box::new(TracingLogger),
            settled: HashSet::new(),
            shutdown: None,
            report: BacktestReport::default(),
        }
    }

    pub fn with_logger(mut self, logger: impl ClearedLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Stop between updates once `flag` is set
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        info!(strategy = strategy.name(), "strategy added");
        self.strategies.push(Box::new(strategy));
    }

    pub fn env_mut(&mut self) -> &mut TradingEnv {
        &mut self.env
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn markets(&self) -> &Markets {
        &self.markets
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Replay `feeds` to the end and return the report
    pub fn run(&mut self, feeds: &[HistoricalFeed]) -> PaddockResult<BacktestReport> {
        self.report = BacktestReport::default();
        self.state = EngineState::Streaming;
        info!(feeds = feeds.len(), strategies = self.strategies.len(), "backtest started");
        for strategy in self.strategies.iter_mut() {
            strategy.start();
        }

        self.clock.reset();
        let mut group = None;
        for update_ref in replay_order(feeds) {
            if self.shutdown_requested() {
                warn!("backtest interrupted");
                self.report.interrupted = true;
                break;
            }
            if group != Some(update_ref.group) {
                if group.is_some() {
                    self.end_group()?;
                }
                group = Some(update_ref.group);
            }
            let feed = &feeds[update_ref.feed];
            for book in &feed.updates[update_ref.update] {
                self.process_book(&feed.stream_id, book)?;
            }
        }

        self.drain()?;
        self.state = EngineState::Idle;
        info!(
            markets = self.report.markets.len(),
            snapshots = self.report.snapshots_processed,
            skipped = self.report.snapshots_skipped,
            profit = %self.report.total_profit(),
            "backtest finished"
        );
        Ok(std::mem::take(&mut self.report))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn process_book(&mut self, stream_id: &StreamId, book: &MarketBook) -> PaddockResult<()> {
        if self.settled.contains(&book.market_id) {
            debug!(market_id = %book.market_id, "snapshot after settlement ignored");
            return Ok(());
        }
        if let Err(err) = self.validator.validate(book) {
            warn!(market_id = %book.market_id, publish_time = book.publish_time_ms, error = %err, "snapshot skipped");
            self.report.snapshots_skipped += 1;
            return Ok(());
        }
        let now_ms = self.clock.advance_to(book.publish_time_ms);
        let market_id = book.market_id.clone();
        self.markets.apply(book.clone());
        self.report.snapshots_processed += 1;

        let ready = self.queue.take_ready(now_ms);
        self.execute_packages(ready, now_ms)?;

        let market = self.markets.try_get_mut(&market_id)?;
        self.middleware.process(market, now_ms)?;
        dispatch_book(
            &mut self.strategies,
            stream_id,
            market,
            &mut self.env,
            &mut self.queue,
            now_ms,
        );

        if market.book().is_closed() {
            self.close_market(&market_id, now_ms)?;
        }
        Ok(())
    }

    fn execute_packages(&mut self, packages: Vec<OrderPackage>, now_ms: u64) -> PaddockResult<()> {
        for package in packages {
            let Some(market) = self.markets.get_mut(&package.market_id) else {
                warn!(package_id = %package.id, market_id = %package.market_id, "package for unknown market dropped");
                continue;
            };
            self.exchange.execute(market, &package, now_ms)?;
            self.report.packages_executed += 1;
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

        let dropped = self.queue.forget(market_id);
        if dropped > 0 {
            warn!(%market_id, dropped, "packages for closed market dropped");
        }
        self.markets.remove(market_id);
        self.middleware.forget(market_id);
        self.validator.forget(market_id);
        self.settled.insert(market_id.clone());
        self.report.markets.push(cleared);
        self.report.orders.extend(orders);
        Ok(())
    }

    fn end_group(&mut self) -> PaddockResult<()> {
        let remaining = self.queue.take_all();
        if !remaining.is_empty() {
            debug!(packages = remaining.len(), "flushing packages at end of replay group");
        }
        let now_ms = self.clock.now_ms();
        self.execute_packages(remaining, now_ms)?;
        self.clock.reset();
        Ok(())
    }

    fn drain(&mut self) -> PaddockResult<()> {
        self.state = EngineState::Draining;
        let remaining = self.queue.take_all();
        if !remaining.is_empty() {
            info!(packages = remaining.len(), "draining queued packages");
        }
        let now_ms = self.clock.now_ms();
        self.execute_packages(remaining, now_ms)?;
        for strategy in self.strategies.iter_mut() {
            strategy.finish();
        }
        self.report.unsettled_markets = self.markets.iter().map(|m| m.market_id.clone()).collect();
        if !self.report.unsettled_markets.is_empty() {
            warn!(markets = self.report.unsettled_markets.len(), "markets never closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::core::{OrderStatus, SelectionKey, Side};
    use crate::data::{MarketBookBuilder, MarketStatus, RunnerStatus};
    use crate::engine::StrategyContext;
    use crate::order::OrderType;
    use rust_decimal_macros::dec;

    struct BackOnce {
        streams: Vec<StreamId>,
        done: bool,
        finished: bool,
    }

    impl Strategy for BackOnce {
        fn name(&self) -> &str {
            "back_once"
        }

        fn stream_ids(&self) -> &[StreamId] {
            &self.streams
        }

        fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
            if !self.done && ctx.book().is_open() {
                self.done = ctx
                    .place_order(SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(10)))
                    .is_ok();
            }
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn open(t: u64) -> MarketBook {
        MarketBookBuilder::new("1.1")
            .publish_time(t)
            .runner(1, |r| r.back(dec!(2.0), dec!(20)).lay(dec!(2.02), dec!(20)))
            .runner(2, |r| r.back(dec!(2.0), dec!(20)))
            .build()
    }

    fn closed(t: u64) -> MarketBook {
        MarketBookBuilder::from_book(&open(t))
            .status(MarketStatus::Closed)
            .update_runner(1, |r| r.status(RunnerStatus::Winner).clear_ladders())
            .update_runner(2, |r| r.status(RunnerStatus::Loser).clear_ladders())
            .build()
    }

    fn config() -> Config {
        Config {
            simulation: SimulationConfig::instant(),
            ..Config::default()
        }
    }

    fn engine() -> BacktestEngine {
        let mut engine = BacktestEngine::new(&config());
        engine.add_strategy(BackOnce {
            streams: vec![StreamId::new("s")],
            done: false,
            finished: false,
        });
        engine
    }

    #[test]
    fn test_fill_and_settle() {
        let feed = HistoricalFeed::new(StreamId::new("s"), "test", vec![vec![open(0)], vec![open(100)], vec![closed(200)]]);
        let mut engine = engine();
        let report = engine.run(&[feed]).unwrap();

        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(report.markets.len(), 1);
        assert_eq!(report.orders.len(), 1);
        let order = &report.orders[0];
        assert_eq!(order.status, OrderStatus::ExecutionComplete);
        assert_eq!(order.size_matched, dec!(10));
        assert_eq!(order.average_price_matched, Some(dec!(2.0)));
        assert_eq!(order.profit, dec!(10.00));
        assert_eq!(report.total_profit(), dec!(10.00));
        assert_eq!(report.packages_executed, 1);
        assert!(report.unsettled_markets.is_empty());
        assert!(engine.markets().is_empty());
    }

    #[test]
    fn test_invalid_snapshot_skipped() {
        let backwards = MarketBookBuilder::from_book(&open(50)).build();
        let feed = HistoricalFeed::new(
            StreamId::new("s"),
            "test",
            vec![vec![open(100)], vec![backwards], vec![closed(200)]],
        );
        let report = engine().run(&[feed]).unwrap();
        assert_eq!(report.snapshots_skipped, 1);
        assert_eq!(report.snapshots_processed, 2);
    }

    #[test]
    fn test_drain_executes_queued_packages() {
        let feed = HistoricalFeed::new(StreamId::new("s"), "test", vec![vec![open(0)]]);
        let mut engine = BacktestEngine::new(&Config::default());
        engine.add_strategy(BackOnce {
            streams: vec![StreamId::new("s")],
            done: false,
            finished: false,
        });
        let report = engine.run(&[feed]).unwrap();
        // placed on the only snapshot, executed while draining
        assert_eq!(report.packages_executed, 1);
        assert_eq!(report.unsettled_markets, vec![MarketId::new("1.1")]);
        let market = engine.markets().get(&MarketId::new("1.1")).unwrap();
        assert_eq!(market.orders().next().unwrap().size_matched(), dec!(10));
    }

    #[test]
    fn test_unsubscribed_strategy_not_called() {
        let feed = HistoricalFeed::new(StreamId::new("other"), "test", vec![vec![open(0)], vec![closed(100)]]);
        let report = engine().run(&[feed]).unwrap();
        assert!(report.orders.is_empty());
        assert_eq!(report.markets[0].bet_count, 0);
    }

    #[test]
    fn test_shutdown_flag_interrupts() {
        let flag = Arc::new(AtomicBool::new(true));
        let feed = HistoricalFeed::new(StreamId::new("s"), "test", vec![vec![open(0)]]);
        let report = engine().with_shutdown(flag).run(&[feed]).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.snapshots_processed, 0);
    }
}
