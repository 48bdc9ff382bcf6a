//! A single exchange instruction and its bookkeeping

use super::order_type::OrderType;
use crate::core::{
    money, BetId, ClientId, InstructionErrorCode, MarketId, OrderId, OrderStatus, PaddockError,
    PaddockResult, SelectionKey, Side, StatusChange, StrategyId, TradeId,
};
use crate::data::ladder::MIN_PRICE;
use crate::data::RunnerStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One matched portion of an order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub at_ms: u64,
    pub price: Decimal,
    pub size: Decimal,
}

/// Matching-engine state carried by orders placed on the simulated exchange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedState {
    /// Estimated size queued ahead of the order at its price
    pub piq: Decimal,
    /// Set once the order has been settled against the starting price
    pub bsp_reconciled: bool,
    /// Market version seen by the last `advance`
    pub last_version: Option<u64>,
}

/// Outcome attached to an order when its market settles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub runner_status: RunnerStatus,
    /// Runners sharing the winning place, 1 when no dead heat
    pub dead_heat_divisor: u32,
    /// Place terms of an each-way market
    pub each_way_divisor: Option<Decimal>,
}

impl Settlement {
    pub fn new(runner_status: RunnerStatus) -> Self {
        Self {
            runner_status,
            dead_heat_divisor: 1,
            each_way_divisor: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub trade_id: TradeId,
    pub market_id: MarketId,
    pub selection: SelectionKey,
    pub strategy: StrategyId,
    pub client: ClientId,
    pub side: Side,
    pub order_type: OrderType,
    status: OrderStatus,
    status_log: Vec<StatusChange>,
    pub bet_id: Option<BetId>,
    /// Market version the order was priced against, checked at placement
    pub market_version: Option<u64>,
    pub created_at_ms: u64,
    pub placed_at_ms: Option<u64>,
    matched: Vec<Fill>,
    size_cancelled: Decimal,
    size_lapsed: Decimal,
    size_voided: Decimal,
    pub simulated: SimulatedState,
    pub violation_msg: Option<String>,
    pub last_error: Option<InstructionErrorCode>,
    pub settlement: Option<Settlement>,
    /// Included in a place package handed to an execution sink
    pub submitted: bool,
    /// Order this one replaced, and the successor that replaced it
    pub replaces: Option<OrderId>,
    pub replaced_by: Option<OrderId>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        trade_id: TradeId,
        market_id: MarketId,
        selection: SelectionKey,
        strategy: StrategyId,
        client: ClientId,
        side: Side,
        order_type: OrderType,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            trade_id,
            market_id,
            selection,
            strategy,
            client,
            side,
            order_type,
            status: OrderStatus::Pending,
            status_log: vec![StatusChange {
                status: OrderStatus::Pending,
                at_ms: now_ms,
            }],
            bet_id: None,
            market_version: None,
            created_at_ms: now_ms,
            placed_at_ms: None,
            matched: Vec::new(),
            size_cancelled: Decimal::ZERO,
            size_lapsed: Decimal::ZERO,
            size_voided: Decimal::ZERO,
            simulated: SimulatedState::default(),
            violation_msg: None,
            last_error: None,
            settlement: None,
            submitted: false,
            replaces: None,
            replaced_by: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[inline]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn status_log(&self) -> &[StatusChange] {
        &self.status_log
    }

    /// Move to `next`, rejecting transitions the lifecycle forbids
    pub fn set_status(&mut self, next: OrderStatus, now_ms: u64) -> PaddockResult<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(PaddockError::OrderState {
                order_id: self.id,
                operation: "transition",
                status: self.status,
            });
        }
        debug!(order_id = %self.id, from = %self.status, to = %next, "order status");
        self.status = next;
        self.status_log.push(StatusChange {
            status: next,
            at_ms: now_ms,
        });
        Ok(())
    }

    /// Mark the order rejected by a trading control
    pub fn violation(&mut self, reason: impl Into<String>, now_ms: u64) -> PaddockResult<()> {
        self.set_status(OrderStatus::Violation, now_ms)?;
        self.violation_msg = Some(reason.into());
        Ok(())
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move a working or pending order with nothing left to a terminal state
    ///
    /// Fully lapsed orders end `Lapsed`, fully voided ones `Voided`, anything
    /// that matched or was cancelled ends `ExecutionComplete`.
    pub fn complete_if_resolved(&mut self, now_ms: u64) -> PaddockResult<bool> {
        if self.is_terminal() || (self.size_remaining() > Decimal::ZERO && !self.sp_resolved()) {
            return Ok(false);
        }
        let next = self.final_status();
        self.set_status(next, now_ms)?;
        Ok(true)
    }

    fn final_status(&self) -> OrderStatus {
        let nothing_matched = self.matched.is_empty();
        if nothing_matched && self.size_cancelled.is_zero() {
            if self.size_lapsed.is_zero() && self.size_voided > Decimal::ZERO {
                return OrderStatus::Voided;
            }
            if self.size_lapsed > Decimal::ZERO {
                return OrderStatus::Lapsed;
            }
        }
        OrderStatus::ExecutionComplete
    }

    fn sp_resolved(&self) -> bool {
        !self.order_type.is_limit() && self.simulated.bsp_reconciled
    }

    // ========================================================================
    // Sizes
    // ========================================================================

    /// Requested size
    ///
    /// Starting-price orders are sized in liability until the starting price
    /// fixes the stake.
    pub fn size(&self) -> Decimal {
        match &self.order_type {
            OrderType::Limit(limit) => limit.size,
            OrderType::LimitOnClose { liability, .. } | OrderType::MarketOnClose { liability } => {
                *liability
            }
        }
    }

    pub fn matched(&self) -> &[Fill] {
        &self.matched
    }

    pub fn size_matched(&self) -> Decimal {
        money::round2(self.matched.iter().map(|f| f.size).sum())
    }

    pub fn average_price_matched(&self) -> Option<Decimal> {
        money::wap(self.matched.iter().map(|f| (f.price, f.size)))
    }

    pub fn size_cancelled(&self) -> Decimal {
        self.size_cancelled
    }

    pub fn size_lapsed(&self) -> Decimal {
        self.size_lapsed
    }

    pub fn size_voided(&self) -> Decimal {
        self.size_voided
    }

    /// Size still working on the exchange
    pub fn size_remaining(&self) -> Decimal {
        if self.is_terminal() {
            return Decimal::ZERO;
        }
        match &self.order_type {
            OrderType::Limit(limit) => money::round2(
                limit.size
                    - self.size_matched()
                    - self.size_cancelled
                    - self.size_lapsed
                    - self.size_voided,
            )
            .max(Decimal::ZERO),
            OrderType::LimitOnClose { liability, .. } | OrderType::MarketOnClose { liability } => {
                if self.simulated.bsp_reconciled {
                    Decimal::ZERO
                } else {
                    money::round2(
                        *liability - self.size_cancelled - self.size_lapsed - self.size_voided,
                    )
                    .max(Decimal::ZERO)
                }
            }
        }
    }

    // ========================================================================
    // Ledger updates
    // ========================================================================

    /// Record a match, capped at the remaining size for limit orders
    ///
    /// Returns the size actually recorded.
    pub fn record_fill(&mut self, at_ms: u64, price: Decimal, size: Decimal) -> Decimal {
        let size = match self.order_type {
            OrderType::Limit(_) => money::round2(size.min(self.size_remaining())),
            _ => money::round2(size),
        };
        if size <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        debug!(order_id = %self.id, %price, %size, "fill");
        self.matched.push(Fill {
            at_ms,
            price: money::round2(price),
            size,
        });
        size
    }

    pub fn record_cancel(&mut self, size: Decimal) -> Decimal {
        let size = money::round2(size.min(self.size_remaining()));
        self.size_cancelled = money::round2(self.size_cancelled + size);
        size
    }

    pub fn record_lapse(&mut self, size: Decimal) -> Decimal {
        let size = money::round2(size.min(self.size_remaining()));
        self.size_lapsed = money::round2(self.size_lapsed + size);
        size
    }

    pub fn record_void(&mut self, size: Decimal) -> Decimal {
        let size = money::round2(size.min(self.size_remaining()));
        self.size_voided = money::round2(self.size_voided + size);
        size
    }

    /// Void everything: matched size moves to voided, remainder is voided
    pub fn void_all(&mut self) {
        let remaining = self.size_remaining();
        let matched = self.size_matched();
        self.matched.clear();
        self.size_voided = money::round2(self.size_voided + matched + remaining);
    }

    /// Scale matched prices after another runner's removal, never below
    /// the lowest ladder price
    pub fn reduce_matched_prices(&mut self, adjustment_factor: Decimal) {
        let multiplier = Decimal::ONE - adjustment_factor / Decimal::ONE_HUNDRED;
        for fill in &mut self.matched {
            fill.price = money::round2(fill.price * multiplier).max(MIN_PRICE);
        }
    }

    /// Change the persistence of a limit order
    pub fn set_persistence(&mut self, persistence: super::PersistenceType) -> bool {
        match self.order_type.as_limit_mut() {
            Some(limit) => {
                limit.persistence_type = persistence;
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Realized profit, zero until the order is settled
    pub fn profit(&self) -> Decimal {
        crate::simulation::profit::order_profit(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LimitOrder, PersistenceType};
    use rust_decimal_macros::dec;

    fn limit_order(price: Decimal, size: Decimal) -> Order {
        Order::new(
            OrderId(1),
            TradeId(1),
            MarketId::new("1.1"),
            SelectionKey::selection(7),
            StrategyId::new("test"),
            ClientId::new("client"),
            Side::Back,
            OrderType::limit(price, size),
            0,
        )
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = limit_order(dec!(2.0), dec!(10));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.status_log().len(), 1);
        assert_eq!(order.size_remaining(), dec!(10));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        let err = order.set_status(OrderStatus::Cancelling, 5).unwrap_err();
        assert!(matches!(err, PaddockError::OrderState { .. }));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_fill_capped_at_remaining() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        order.set_status(OrderStatus::Executable, 1).unwrap();
        assert_eq!(order.record_fill(2, dec!(2.0), dec!(6)), dec!(6));
        assert_eq!(order.record_fill(3, dec!(2.0), dec!(6)), dec!(4));
        assert_eq!(order.size_matched(), dec!(10));
        assert_eq!(order.size_remaining(), dec!(0));
        assert!(order.complete_if_resolved(4).unwrap());
        assert_eq!(order.status(), OrderStatus::ExecutionComplete);
    }

    #[test]
    fn test_average_price_matched() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        order.record_fill(1, dec!(2.1), dec!(5));
        order.record_fill(2, dec!(2.0), dec!(5));
        assert_eq!(order.average_price_matched(), Some(dec!(2.05)));
    }

    #[test]
    fn test_full_lapse_ends_lapsed() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        order.record_lapse(dec!(10));
        assert!(order.complete_if_resolved(1).unwrap());
        assert_eq!(order.status(), OrderStatus::Lapsed);
    }

    #[test]
    fn test_void_all_moves_matched() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        order.set_status(OrderStatus::Executable, 1).unwrap();
        order.record_fill(2, dec!(2.0), dec!(4));
        order.void_all();
        assert_eq!(order.size_matched(), dec!(0));
        assert_eq!(order.size_voided(), dec!(10));
        assert!(order.complete_if_resolved(3).unwrap());
        assert_eq!(order.status(), OrderStatus::Voided);
    }

    #[test]
    fn test_reduce_matched_prices() {
        let mut order = limit_order(dec!(4.0), dec!(10));
        order.record_fill(1, dec!(4.0), dec!(10));
        order.reduce_matched_prices(dec!(25));
        assert_eq!(order.matched()[0].price, dec!(3.00));
    }

    #[test]
    fn test_reduced_price_floored_at_ladder_minimum() {
        let mut order = limit_order(dec!(1.2), dec!(10));
        order.record_fill(1, dec!(1.2), dec!(10));
        order.reduce_matched_prices(dec!(90));
        assert_eq!(order.matched()[0].price, dec!(1.01));
    }

    #[test]
    fn test_sizes_never_exceed_requested() {
        let mut order = limit_order(dec!(3.0), dec!(10));
        order.record_fill(1, dec!(3.0), dec!(3.333));
        order.record_cancel(dec!(4));
        order.record_lapse(dec!(100));
        let total = order.size_matched()
            + order.size_cancelled()
            + order.size_lapsed()
            + order.size_voided();
        assert!(total <= dec!(10));
        assert_eq!(order.size_remaining(), dec!(0));
    }

    #[test]
    fn test_set_persistence_only_for_limit() {
        let mut order = limit_order(dec!(2.0), dec!(10));
        assert!(order.set_persistence(PersistenceType::Persist));
        assert_eq!(
            order.order_type,
            OrderType::Limit(LimitOrder::new(dec!(2.0), dec!(10)).persistence(PersistenceType::Persist))
        );
        order.order_type = OrderType::MarketOnClose { liability: dec!(5) };
        assert!(!order.set_persistence(PersistenceType::Persist));
    }
}
