//! Demo strategies used by the binaries

use paddock_core::core::{OrderId, OrderStatus, SelectionKey, Side, StreamId};
use paddock_core::data::MarketBook;
use paddock_core::engine::{ClearedMarket, Strategy, StrategyContext};
use paddock_core::markets::Market;
use paddock_core::{MarketId, OrderType};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// How long an unmatched bet is left working before it is pulled
const CANCEL_AFTER_MS: u64 = 60_000;

/// Backs the pre-race favourite once per market at the best available
/// price and cancels whatever has not matched after a minute
pub struct BackFavourite {
    streams: Vec<StreamId>,
    stake: Decimal,
    orders: HashMap<MarketId, (OrderId, u64)>,
    settled: usize,
}

impl BackFavourite {
    pub fn new(stream_id: StreamId, stake: Decimal) -> Self {
        Self {
            streams: vec![stream_id],
            stake,
            orders: HashMap::new(),
            settled: 0,
        }
    }

    fn favourite(book: &MarketBook) -> Option<(SelectionKey, Decimal)> {
        book.active_runners()
            .filter_map(|r| r.best_back().map(|level| (r.key(), level.price)))
            .min_by(|a, b| a.1.cmp(&b.1))
    }
}

impl Strategy for BackFavourite {
    fn name(&self) -> &str {
        "back_favourite"
    }

    fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    fn check_market_book(&mut self, market: &Market) -> bool {
        market.book().is_open() && !market.book().inplay
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
        let market_id = ctx.market().market_id.clone();
        match self.orders.get(&market_id).copied() {
            None => {
                let Some((selection, price)) = Self::favourite(ctx.book()) else {
                    return;
                };
                match ctx.place_order(selection, Side::Back, OrderType::limit(price, self.stake)) {
                    Ok(order_id) => {
                        self.orders.insert(market_id, (order_id, ctx.now_ms()));
                    }
                    Err(err) => tracing::warn!(%market_id, error = %err, "favourite not backed"),
                }
            }
            Some((order_id, placed_at)) => {
                let working = ctx.market().order(order_id).is_some_and(|o| {
                    o.status() == OrderStatus::Executable && o.size_remaining() > Decimal::ZERO
                });
                if working && ctx.now_ms().saturating_sub(placed_at) >= CANCEL_AFTER_MS {
                    if let Err(err) = ctx.cancel_order(order_id) {
                        tracing::warn!(%market_id, error = %err, "cancel failed");
                    }
                }
            }
        }
    }

    fn process_closed_market(&mut self, _market: &Market, cleared: &ClearedMarket) {
        self.settled += 1;
        self.orders.remove(&cleared.market_id);
    }

    fn finish(&mut self) {
        tracing::info!(markets = self.settled, "back_favourite finished");
    }
}
