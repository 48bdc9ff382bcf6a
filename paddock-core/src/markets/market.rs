//! One market: last snapshot, trades, blotter and runner analytics

use super::blotter::Blotter;
use crate::core::{
    ClientId, MarketId, OrderId, PaddockError, PaddockResult, SelectionKey, Side, StrategyId,
    TradeId,
};
use crate::data::{MarketBook, RunnerStatus};
use crate::order::{Order, OrderType, Settlement, TradeBook};
use crate::simulation::RunnerAnalytics;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

/// Disjoint borrows of a market's fields
pub struct MarketParts<'a> {
    pub book: &'a MarketBook,
    pub analytics: &'a mut HashMap<SelectionKey, RunnerAnalytics>,
    pub trades: &'a mut TradeBook,
    pub blotter: &'a mut Blotter,
}

impl MarketParts<'_> {
    pub fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        let order_ref = self.blotter.get(order_id)?;
        self.trades.get_mut(order_ref)
    }
}

#[derive(Debug)]
pub struct Market {
    pub market_id: MarketId,
    pub event_id: Option<String>,
    book: MarketBook,
    pub trades: TradeBook,
    pub blotter: Blotter,
    pub analytics: HashMap<SelectionKey, RunnerAnalytics>,
    closed: bool,
    pub created_at_ms: u64,
}

impl Market {
    pub fn new(book: MarketBook) -> Self {
        let market_id = book.market_id.clone();
        Self {
            event_id: book.event_id.clone(),
            trades: TradeBook::new(market_id.clone()),
            blotter: Blotter::new(market_id.clone()),
            analytics: HashMap::new(),
            closed: false,
            created_at_ms: book.publish_time_ms,
            market_id,
            book,
        }
    }

    pub fn book(&self) -> &MarketBook {
        &self.book
    }

    /// Replace the snapshot; the caller has validated it
    pub fn update_book(&mut self, book: MarketBook) {
        if self.event_id.is_none() {
            self.event_id = book.event_id.clone();
        }
        self.book = book;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Borrow the snapshot next to mutable access to orders and analytics
    pub fn parts_mut(&mut self) -> MarketParts<'_> {
        MarketParts {
            book: &self.book,
            analytics: &mut self.analytics,
            trades: &mut self.trades,
            blotter: &mut self.blotter,
        }
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub fn open_trade(&mut self, selection: SelectionKey, strategy: StrategyId, now_ms: u64) -> TradeId {
        self.trades.open_trade(selection, strategy, now_ms)
    }

    /// Create a pending order in `trade_id` and index it
    pub fn create_order(
        &mut self,
        trade_id: TradeId,
        client: ClientId,
        side: Side,
        order_type: OrderType,
        now_ms: u64,
    ) -> PaddockResult<OrderId> {
        let order_ref = self.trades.create_order(trade_id, client, side, order_type, now_ms)?;
        let order = self
            .trades
            .get(order_ref)
            .ok_or(PaddockError::UnknownTrade(trade_id))?;
        self.blotter.insert(order, order_ref)?;
        Ok(order.id)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.blotter.get(order_id).and_then(|r| self.trades.get(r))
    }

    pub fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        let order_ref = self.blotter.get(order_id)?;
        self.trades.get_mut(order_ref)
    }

    pub fn try_order_mut(&mut self, order_id: OrderId) -> PaddockResult<&mut Order> {
        self.order_mut(order_id).ok_or(PaddockError::UnknownOrder(order_id))
    }

    /// Orders of one strategy on one selection, in creation order
    pub fn strategy_selection_orders<'a>(
        &'a self,
        strategy: &StrategyId,
        selection: SelectionKey,
    ) -> impl Iterator<Item = &'a Order> + 'a {
        self.blotter
            .strategy_selection_orders(strategy, selection)
            .iter()
            .filter_map(move |id| self.order(*id))
    }

    pub fn strategy_orders<'a>(&'a self, strategy: &StrategyId) -> impl Iterator<Item = &'a Order> + 'a {
        self.blotter
            .strategy_orders(strategy)
            .iter()
            .filter_map(move |id| self.order(*id))
    }

    /// Every order in creation order
    pub fn orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.blotter.order_ids().iter().filter_map(move |id| self.order(*id))
    }

    /// Ids of orders whose trade is still open
    pub fn live_order_ids(&self) -> Vec<OrderId> {
        self.blotter.live_orders().collect()
    }

    /// Resolve an order whose sizes just changed
    ///
    /// Completes the order when nothing remains, then its trade, and drops a
    /// completed trade from the live set.
    pub fn on_order_changed(&mut self, order_id: OrderId, now_ms: u64) -> PaddockResult<()> {
        let order = self.try_order_mut(order_id)?;
        let trade_id = order.trade_id;
        order.complete_if_resolved(now_ms)?;
        self.check_trade(trade_id, now_ms);
        Ok(())
    }

    /// Complete `trade_id` if all of its orders are terminal
    pub fn check_trade(&mut self, trade_id: TradeId, now_ms: u64) {
        if let Some(trade) = self.trades.trade_mut(trade_id) {
            if trade.complete_if_done(now_ms) {
                self.blotter.complete_trade(trade_id);
            }
        }
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Settle every order against the closing snapshot
    ///
    /// Unmatched size lapses; each order gets its runner's result. Returns
    /// the ids of settled orders in creation order.
    pub fn settle(&mut self, now_ms: u64) -> PaddockResult<Vec<OrderId>> {
        if self.closed {
            return Ok(Vec::new());
        }
        let ids: Vec<OrderId> = self.blotter.order_ids().to_vec();
        let dead_heat = self.book.dead_heat_divisor();
        let each_way = self.book.each_way_divisor;
        let market_id = self.market_id.clone();

        for id in &ids {
            let selection = self.order(*id).ok_or(PaddockError::UnknownOrder(*id))?.selection;
            let runner_status = self.book.runner(&selection).map(|r| r.status);
            let order = self.try_order_mut(*id)?;
            if !order.is_terminal() {
                let remaining = order.size_remaining();
                order.record_lapse(remaining);
                order.complete_if_resolved(now_ms)?;
            }
            match runner_status {
                Some(status) => {
                    let dead_heat_divisor = if status == RunnerStatus::Winner { dead_heat } else { 1 };
                    order.settlement = Some(Settlement {
                        runner_status: status,
                        dead_heat_divisor,
                        each_way_divisor: each_way,
                    });
                }
                None => warn!(%market_id, order_id = %id, "runner missing at settlement"),
            }
        }

        let trade_ids: Vec<TradeId> = self.trades.trades().map(|t| t.id).collect();
        for trade_id in trade_ids {
            self.check_trade(trade_id, now_ms);
        }
        self.closed = true;
        info!(market_id = %self.market_id, orders = ids.len(), "market settled");
        Ok(ids)
    }

    /// Sum of settled profit across the given strategy's orders, or all
    pub fn profit(&self, strategy: Option<&StrategyId>) -> Decimal {
        self.orders()
            .filter(|o| strategy.map_or(true, |s| &o.strategy == s))
            .map(Order::profit)
            .sum()
    }
}
