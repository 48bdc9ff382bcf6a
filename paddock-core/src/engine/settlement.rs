//! Cleared order and market summaries
//!
//! After a market closes and its orders are settled, each order becomes a
//! `ClearedOrder` and the market a `ClearedMarket`. Commission is charged
//! once per market on positive net profit at the market's base rate.

use crate::core::{
    money, BetId, MarketId, OrderId, OrderStatus, SelectionKey, Side, StrategyId, TradeId,
};
use crate::data::RunnerStatus;
use crate::markets::Market;
use crate::order::Order;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearedOrder {
    pub order_id: OrderId,
    pub trade_id: TradeId,
    pub bet_id: Option<BetId>,
    pub market_id: MarketId,
    pub selection: SelectionKey,
    pub strategy: StrategyId,
    pub side: Side,
    pub order_type: String,
    pub price: Option<Decimal>,
    pub size: Decimal,
    pub status: OrderStatus,
    pub size_matched: Decimal,
    pub average_price_matched: Option<Decimal>,
    pub size_cancelled: Decimal,
    pub size_lapsed: Decimal,
    pub size_voided: Decimal,
    pub runner_status: Option<RunnerStatus>,
    pub profit: Decimal,
    pub settled_at_ms: u64,
}

impl ClearedOrder {
    pub fn from_order(order: &Order, settled_at_ms: u64) -> Self {
        Self {
            order_id: order.id,
            trade_id: order.trade_id,
            bet_id: order.bet_id,
            market_id: order.market_id.clone(),
            selection: order.selection,
            strategy: order.strategy.clone(),
            side: order.side,
            order_type: order.order_type.name().to_string(),
            price: order.order_type.price(),
            size: order.size(),
            status: order.status(),
            size_matched: order.size_matched(),
            average_price_matched: order.average_price_matched(),
            size_cancelled: order.size_cancelled(),
            size_lapsed: order.size_lapsed(),
            size_voided: order.size_voided(),
            runner_status: order.settlement.as_ref().map(|s| s.runner_status),
            profit: order.profit(),
            settled_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearedMarket {
    pub market_id: MarketId,
    pub event_id: Option<String>,
    /// Orders with matched size
    pub bet_count: usize,
    pub profit: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
    pub settled_at_ms: u64,
}

/// Summaries for a settled market and all of its orders
pub fn clear_market(market: &Market, settled_at_ms: u64) -> (ClearedMarket, Vec<ClearedOrder>) {
    let orders: Vec<ClearedOrder> = market
        .orders()
        .map(|o| ClearedOrder::from_order(o, settled_at_ms))
        .collect();
    let bet_count = orders.iter().filter(|o| o.size_matched > Decimal::ZERO).count();
    let profit = money::round2(orders.iter().map(|o| o.profit).sum());
    let commission = commission(profit, market.book().market_base_rate);
    let cleared = ClearedMarket {
        market_id: market.market_id.clone(),
        event_id: market.event_id.clone(),
        bet_count,
        profit,
        commission,
        net: profit - commission,
        settled_at_ms,
    };
    (cleared, orders)
}

/// `round2(max(profit, 0) × rate / 100)`
pub fn commission(profit: Decimal, base_rate: Option<Decimal>) -> Decimal {
    let rate = base_rate.unwrap_or_default();
    money::round2(profit.max(Decimal::ZERO) * rate / Decimal::ONE_HUNDRED)
}

/// Receives cleared summaries as markets close
pub trait ClearedLogger {
    fn log_cleared_orders(&mut self, market: &ClearedMarket, orders: &[ClearedOrder]);
}

/// Writes cleared summaries through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ClearedLogger for TracingLogger {
    fn log_cleared_orders(&mut self, market: &ClearedMarket, orders: &[ClearedOrder]) {
        for order in orders {
            info!(
                market_id = %order.market_id,
                order_id = %order.order_id,
                selection = %order.selection,
                side = %order.side,
                status = %order.status,
                matched = %order.size_matched,
                profit = %order.profit,
                "cleared order"
            );
        }
        info!(
            market_id = %market.market_id,
            bet_count = market.bet_count,
            profit = %market.profit,
            commission = %market.commission,
            net = %market.net,
            "cleared market"
        );
    }
}
