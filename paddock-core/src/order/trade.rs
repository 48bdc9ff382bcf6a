//! Trades and the per-market trade arena
//!
//! A `Trade` owns its orders (the original plus any replacements). Nothing
//! holds a pointer back to a trade; orders name their trade by `TradeId` and
//! indexes elsewhere hold `OrderRef` arena keys resolved through the
//! `TradeBook`.

use super::order::Order;
use super::order_type::OrderType;
use crate::core::{
    ClientId, IdSequence, MarketId, PaddockError, PaddockResult, SelectionKey, Side,
    StrategyId, TradeId, TradeStatus,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Arena key of an order: owning trade plus position in its order list
///
/// Orders are only ever appended to a trade, so slots stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderRef {
    pub trade_id: TradeId,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct Trade {
    pub id: TradeId,
    pub market_id: MarketId,
    pub selection: SelectionKey,
    pub strategy: StrategyId,
    status: TradeStatus,
    orders: Vec<Order>,
    pub created_at_ms: u64,
    pub completed_at_ms: Option<u64>,
    pub notes: Vec<String>,
}

impl Trade {
    pub fn new(
        id: TradeId,
        market_id: MarketId,
        selection: SelectionKey,
        strategy: StrategyId,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            market_id,
            selection,
            strategy,
            status: TradeStatus::Pending,
            orders: Vec::new(),
            created_at_ms: now_ms,
            completed_at_ms: None,
            notes: Vec::new(),
        }
    }

    pub fn status(&self) -> TradeStatus {
        self.status
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_complete(&self) -> bool {
        self.status == TradeStatus::Complete
    }

    /// Append an order, returning its slot
    pub(crate) fn push_order(&mut self, order: Order) -> usize {
        self.orders.push(order);
        self.orders.len() - 1
    }

    /// Mark the trade live once an order has been accepted
    pub fn mark_live(&mut self) {
        if self.status.can_transition_to(TradeStatus::Live) {
            self.status = TradeStatus::Live;
        }
    }

    /// Complete the trade when every order is terminal
    ///
    /// A trade with no orders, or whose last order is mid-replacement, stays
    /// open. Returns true on the transition to `Complete`.
    pub fn complete_if_done(&mut self, now_ms: u64) -> bool {
        if self.is_complete() || self.orders.is_empty() {
            return false;
        }
        let all_terminal = self.orders.iter().all(|o| o.is_terminal());
        let successor_pending = self
            .orders
            .iter()
            .any(|o| o.replaced_by.is_some_and(|id| !self.orders.iter().any(|s| s.id == id)));
        if !all_terminal || successor_pending {
            return false;
        }
        debug!(trade_id = %self.id, "trade complete");
        self.status = TradeStatus::Complete;
        self.completed_at_ms = Some(now_ms);
        true
    }
}

/// Arena of every trade in one market
#[derive(Debug)]
pub struct TradeBook {
    market_id: MarketId,
    trades: BTreeMap<TradeId, Trade>,
    order_ids: IdSequence,
    trade_ids: IdSequence,
}

impl TradeBook {
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            trades: BTreeMap::new(),
            order_ids: IdSequence::new(),
            trade_ids: IdSequence::new(),
        }
    }

    pub fn market_id(&self) -> &MarketId {
        &self.market_id
    }

    pub fn open_trade(&mut self, selection: SelectionKey, strategy: StrategyId, now_ms: u64) -> TradeId {
        let id = self.trade_ids.next_trade();
        let trade = Trade::new(id, self.market_id.clone(), selection, strategy, now_ms);
        self.trades.insert(id, trade);
        id
    }

    /// Create a pending order inside `trade_id`
    pub fn create_order(
        &mut self,
        trade_id: TradeId,
        client: ClientId,
        side: Side,
        order_type: OrderType,
        now_ms: u64,
    ) -> PaddockResult<OrderRef> {
        let order_id = self.order_ids.next_order();
        let trade = self
            .trades
            .get_mut(&trade_id)
            .ok_or(PaddockError::UnknownTrade(trade_id))?;
        let order = Order::new(
            order_id,
            trade_id,
            trade.market_id.clone(),
            trade.selection,
            trade.strategy.clone(),
            client,
            side,
            order_type,
            now_ms,
        );
        let slot = trade.push_order(order);
        Ok(OrderRef { trade_id, slot })
    }

    pub fn trade(&self, trade_id: TradeId) -> Option<&Trade> {
        self.trades.get(&trade_id)
    }

    pub fn trade_mut(&mut self, trade_id: TradeId) -> Option<&mut Trade> {
        self.trades.get_mut(&trade_id)
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    pub fn get(&self, order_ref: OrderRef) -> Option<&Order> {
        self.trades
            .get(&order_ref.trade_id)
            .and_then(|t| t.orders.get(order_ref.slot))
    }

    pub fn get_mut(&mut self, order_ref: OrderRef) -> Option<&mut Order> {
        self.trades
            .get_mut(&order_ref.trade_id)
            .and_then(|t| t.orders.get_mut(order_ref.slot))
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
