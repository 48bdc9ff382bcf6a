//! Test helpers for building markets, feeds and strategies

use crate::config::{Config, SimulationConfig};
use crate::core::{OrderId, SelectionKey, Side, StreamId};
use crate::data::{MarketBook, MarketBookBuilder, MarketStatus, RunnerStatus};
use crate::engine::{ClearedLogger, ClearedMarket, ClearedOrder, HistoricalFeed, Strategy, StrategyContext};
use crate::order::OrderType;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const TEST_STREAM: &str = "test";

/// Configuration with zero simulated latency
pub fn instant_config() -> Config {
    Config {
        simulation: SimulationConfig::instant(),
        ..Config::default()
    }
}

/// Open market whose runners all show `back` and `lay` at the given prices
/// with `depth` available
pub fn open_book(
    market_id: &str,
    publish_time_ms: u64,
    runners: &[(u64, Decimal, Decimal)],
    depth: Decimal,
) -> MarketBook {
    runners
        .iter()
        .fold(
            MarketBookBuilder::new(market_id).publish_time(publish_time_ms),
            |builder, &(selection_id, back, lay)| {
                builder.runner(selection_id, |r| r.back(back, depth).lay(lay, depth))
            },
        )
        .build()
}

/// `book` closed with `winners` winning and every other active runner losing
pub fn closed_book(book: &MarketBook, publish_time_ms: u64, winners: &[u64]) -> MarketBook {
    let mut builder = MarketBookBuilder::from_book(book)
        .publish_time(publish_time_ms)
        .status(MarketStatus::Closed);
    for runner in &book.runners {
        if runner.status == RunnerStatus::Removed {
            continue;
        }
        let status = if winners.contains(&runner.selection_id) {
            RunnerStatus::Winner
        } else {
            RunnerStatus::Loser
        };
        builder = builder.update_runner(runner.selection_id, |r| r.status(status).clear_ladders());
    }
    builder.build()
}

/// Feed where each snapshot is its own update
pub fn feed_of(books: Vec<MarketBook>) -> HistoricalFeed {
    HistoricalFeed::new(
        StreamId::new(TEST_STREAM),
        "fixture",
        books.into_iter().map(|b| vec![b]).collect(),
    )
}

/// Places a fixed list of orders, one trade each, in a single transaction
/// on the first open snapshot it sees
pub struct ScriptedStrategy {
    name: String,
    streams: Vec<StreamId>,
    orders: Vec<(SelectionKey, Side, OrderType)>,
    placed: Arc<Mutex<Vec<OrderId>>>,
    done: bool,
}

impl ScriptedStrategy {
    pub fn new(name: &str, orders: Vec<(SelectionKey, Side, OrderType)>) -> Self {
        Self {
            name: name.to_string(),
            streams: vec![StreamId::new(TEST_STREAM)],
            orders,
            placed: Arc::new(Mutex::new(Vec::new())),
            done: false,
        }
    }

    /// Ids of the orders created, filled in once the strategy has run
    pub fn placed(&self) -> Arc<Mutex<Vec<OrderId>>> {
        Arc::clone(&self.placed)
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
        if self.done || !ctx.book().is_open() {
            return;
        }
        self.done = true;
        let trades: Vec<_> = self
            .orders
            .iter()
            .map(|(selection, _, _)| ctx.open_trade(*selection))
            .collect();
        let version = Some(ctx.book().version);
        let mut tx = ctx.transaction();
        let mut placed = self.placed.lock();
        for (trade, (_, side, order_type)) in trades.into_iter().zip(&self.orders) {
            if let Ok(id) = tx.place(trade, *side, *order_type, version) {
                placed.push(id);
            }
        }
    }
}

/// Keeps every cleared summary it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    pub markets: Arc<Mutex<Vec<ClearedMarket>>>,
    pub orders: Arc<Mutex<Vec<ClearedOrder>>>,
}

impl ClearedLogger for RecordingLogger {
    fn log_cleared_orders(&mut self, market: &ClearedMarket, orders: &[ClearedOrder]) {
        self.markets.lock().push(market.clone());
        self.orders.lock().extend_from_slice(orders);
    }
}
