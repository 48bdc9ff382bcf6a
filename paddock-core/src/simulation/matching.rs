//! Simulated exchange matching
//!
//! Decides how much of an order fills, when, and at what price, from the
//! snapshots a backtest replays. The rules mirror the exchange:
//!
//! - **Placement** crosses the spread immediately when the best opposing
//!   price is at least as good as the order price, walking the ladder and
//!   filling each level at its own price (price improvement). Fill-or-kill
//!   orders fill at the VWAP of the walk or not at all.
//! - **Resting orders** sit behind the size already queued at their price
//!   (the position in queue, PIQ). Each snapshot's traded-volume delta is
//!   split evenly between backers and layers; half of it first eats into
//!   the PIQ and whatever is left fills the order at its own price.
//! - **Starting-price orders** settle once, when the market reconciles.
//!
//! All sizes and prices are rounded to 2dp as they are computed.

use crate::core::{money, BetId, InstructionErrorCode, OrderStatus, Side};
use crate::data::{ladder, MarketBook, MarketStatus, PriceSize, RunnerBook, RunnerStatus};
use crate::execution::InstructionReport;
use crate::order::{LimitOrder, Order, OrderType, PersistenceType};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Matching rules parameterised by the client's account limits
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine {
    /// Lay starting-price bets with a smaller liability are cancelled
    pub min_bsp_liability: Decimal,
}

impl MatchingEngine {
    pub fn new(min_bsp_liability: Decimal) -> Self {
        Self { min_bsp_liability }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Accept (or refuse) a pending order against the current snapshot
    ///
    /// On success the order gets its bet id and any immediate fills; the
    /// caller moves its status.
    pub fn place(
        &self,
        order: &mut Order,
        book: &MarketBook,
        bet_id: BetId,
        now_ms: u64,
    ) -> InstructionReport {
        if let Err(code) = self.check_placement(order, book) {
            debug!(order_id = %order.id, %code, "placement refused");
            return InstructionReport::failure(order.id, code);
        }
        let Some(runner) = book.runner(&order.selection) else {
            return InstructionReport::failure(order.id, InstructionErrorCode::InvalidRunner);
        };

        order.bet_id = Some(bet_id);
        order.placed_at_ms = Some(now_ms);
        order.simulated.last_version = Some(book.version);

        if let OrderType::Limit(limit) = order.order_type {
            self.match_on_placement(order, &limit, runner, now_ms);
        }
        InstructionReport::success(order)
    }

    fn check_placement(&self, order: &Order, book: &MarketBook) -> Result<(), InstructionErrorCode> {
        if !book.is_open() {
            return Err(InstructionErrorCode::MarketNotOpenForBetting);
        }
        if let Some(version) = order.market_version {
            if version != book.version {
                return Err(InstructionErrorCode::BetLapsedPriceImprovementTooLarge);
            }
        }
        match book.runner(&order.selection) {
            None => return Err(InstructionErrorCode::InvalidRunner),
            Some(runner) if runner.status == RunnerStatus::Removed => {
                return Err(InstructionErrorCode::RunnerRemoved)
            }
            Some(_) => {}
        }
        match &order.order_type {
            OrderType::Limit(limit) => {
                if limit.persistence_type == PersistenceType::MarketOnClose && !book.bsp_market {
                    return Err(InstructionErrorCode::InvalidPersistenceType);
                }
            }
            OrderType::LimitOnClose { .. } | OrderType::MarketOnClose { .. } => {
                if !book.bsp_market || book.inplay {
                    return Err(InstructionErrorCode::MarketNotOpenForBspBetting);
                }
            }
        }
        Ok(())
    }

    fn match_on_placement(&self, order: &mut Order, limit: &LimitOrder, runner: &RunnerBook, now_ms: u64) {
        let (available, queue) = match order.side {
            Side::Back => (&runner.ex.available_to_back, &runner.ex.available_to_lay),
            Side::Lay => (&runner.ex.available_to_lay, &runner.ex.available_to_back),
        };

        let walk = walk_ladder(order.side, available, limit.price, limit.size);

        if limit.is_fill_or_kill() {
            let total = money::round2(walk.iter().map(|l| l.size).sum());
            let min_fill = limit.min_fill_size.unwrap_or(limit.size);
            match money::wap(walk.iter().map(|l| (l.price, l.size))) {
                Some(vwap) if total >= min_fill => {
                    order.record_fill(now_ms, vwap, total);
                    let residual = order.size_remaining();
                    order.record_lapse(residual);
                    debug!(order_id = %order.id, %vwap, %total, %residual, "fill-or-kill matched");
                }
                _ => {
                    order.record_lapse(limit.size);
                    debug!(order_id = %order.id, %total, %min_fill, "fill-or-kill lapsed");
                }
            }
            return;
        }

        for level in &walk {
            order.record_fill(now_ms, level.price, level.size);
        }
        order.simulated.piq = ladder::size_at(queue, limit.price).unwrap_or_default();
        debug!(
            order_id = %order.id,
            matched = %order.size_matched(),
            piq = %order.simulated.piq,
            "placed"
        );
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Cancel `size_reduction` (or all) of the remaining size
    pub fn cancel(
        &self,
        order: &mut Order,
        book: &MarketBook,
        size_reduction: Option<Decimal>,
    ) -> InstructionReport {
        if !book.is_open() {
            return InstructionReport::failure(order.id, InstructionErrorCode::MarketNotOpenForBetting);
        }
        let remaining = order.size_remaining();
        if remaining <= Decimal::ZERO {
            return InstructionReport::failure(order.id, InstructionErrorCode::BetTakenOrLapsed);
        }
        let size = match size_reduction {
            Some(reduction) if reduction < remaining => reduction,
            _ => remaining,
        };
        let cancelled = order.record_cancel(size);
        debug!(order_id = %order.id, %cancelled, "cancelled");
        InstructionReport::cancelled(order, cancelled)
    }

    /// Change the persistence of a resting limit order
    pub fn update(
        &self,
        order: &mut Order,
        book: &MarketBook,
        persistence: PersistenceType,
    ) -> InstructionReport {
        if !book.is_open() {
            return InstructionReport::failure(order.id, InstructionErrorCode::MarketNotOpenForBetting);
        }
        let Some(limit) = order.order_type.as_limit() else {
            return InstructionReport::failure(order.id, InstructionErrorCode::ErrorInOrder);
        };
        if !book.persistence_enabled {
            return InstructionReport::failure(order.id, InstructionErrorCode::InvalidPersistenceType);
        }
        if limit.persistence_type == persistence {
            return InstructionReport::failure(order.id, InstructionErrorCode::NoActionRequired);
        }
        if persistence == PersistenceType::MarketOnClose && !book.bsp_market {
            return InstructionReport::failure(order.id, InstructionErrorCode::InvalidPersistenceType);
        }
        order.set_persistence(persistence);
        InstructionReport::success(order)
    }

    // ========================================================================
    // Per-snapshot progression
    // ========================================================================

    /// Advance a working order by one snapshot and its traded-volume delta
    pub fn advance(&self, order: &mut Order, book: &MarketBook, traded: &[PriceSize], now_ms: u64) {
        if order.is_terminal() || order.status() == OrderStatus::Pending {
            return;
        }
        let Some(runner) = book.runner(&order.selection) else {
            return;
        };

        if order.order_type.takes_starting_price() && !order.simulated.bsp_reconciled {
            if book.bsp_reconciled {
                self.reconcile_starting_price(order, runner, now_ms);
                return;
            }
            if !order.order_type.is_limit() {
                return;
            }
        }

        let OrderType::Limit(limit) = order.order_type else {
            return;
        };
        if order.size_remaining() <= Decimal::ZERO {
            return;
        }

        if order.simulated.last_version != Some(book.version) {
            order.simulated.last_version = Some(book.version);
            if book.status == MarketStatus::Suspended
                && limit.persistence_type == PersistenceType::Lapse
            {
                let lapsed = order.record_lapse(order.size_remaining());
                info!(order_id = %order.id, %lapsed, "lapsed on suspension");
                return;
            }
        }

        self.consume_traded(order, &limit, traded, now_ms);
    }

    fn consume_traded(&self, order: &mut Order, limit: &LimitOrder, traded: &[PriceSize], now_ms: u64) {
        let mut piq = order.simulated.piq;
        for level in traded {
            let compatible = match order.side {
                Side::Back => level.price >= limit.price,
                Side::Lay => level.price <= limit.price,
            };
            if !compatible {
                continue;
            }
            let remaining = order.size_remaining();
            if remaining <= Decimal::ZERO {
                break;
            }
            // traded volume is shared between both sides of the match;
            // the queue is tracked exactly, only fills are rounded
            let half = level.size / Decimal::TWO;
            if piq - half < Decimal::ZERO {
                let size = money::round2(remaining.min(half - piq));
                piq = Decimal::ZERO;
                order.record_fill(now_ms, limit.price, size);
            } else {
                piq -= half;
            }
        }
        order.simulated.piq = piq;
    }

    /// Settle a starting-price order against the reconciled price, once
    fn reconcile_starting_price(&self, order: &mut Order, runner: &RunnerBook, now_ms: u64) {
        let Some(sp) = runner.sp.actual_sp else {
            warn!(order_id = %order.id, selection = %order.selection, "market reconciled without a starting price");
            return;
        };
        if sp <= Decimal::ONE {
            warn!(order_id = %order.id, %sp, "starting price cannot settle a bet");
            return;
        }

        match order.order_type {
            OrderType::Limit(_) => {
                let remaining = order.size_remaining();
                if remaining > Decimal::ZERO {
                    self.take_starting_price(order, sp, remaining, now_ms);
                }
            }
            OrderType::LimitOnClose { price, liability } => {
                let worse = match order.side {
                    Side::Back => sp < price,
                    Side::Lay => sp > price,
                };
                if worse {
                    let lapsed = order.record_lapse(liability);
                    info!(order_id = %order.id, %sp, limit = %price, %lapsed, "limit-on-close lapsed");
                } else {
                    let size = stake_for_liability(order.side, liability, sp);
                    self.take_starting_price(order, sp, size, now_ms);
                }
            }
            OrderType::MarketOnClose { liability } => {
                let size = stake_for_liability(order.side, liability, sp);
                self.take_starting_price(order, sp, size, now_ms);
            }
        }
        order.simulated.bsp_reconciled = true;
    }

    fn take_starting_price(&self, order: &mut Order, sp: Decimal, size: Decimal, now_ms: u64) {
        if order.side == Side::Lay {
            let liability = money::round2(size * (sp - Decimal::ONE));
            if liability < self.min_bsp_liability {
                let cancelled = order.record_cancel(order.size_remaining());
                info!(order_id = %order.id, %liability, %cancelled, "lay below minimum starting-price liability");
                return;
            }
        }
        let matched = order.record_fill(now_ms, sp, size);
        info!(order_id = %order.id, %sp, %matched, "starting price taken");
    }
}

/// Backers stake the liability; layers risk it across `sp - 1`
fn stake_for_liability(side: Side, liability: Decimal, sp: Decimal) -> Decimal {
    match side {
        Side::Back => liability,
        Side::Lay => money::round2(liability / (sp - Decimal::ONE)),
    }
}

/// Levels an order at `price` crosses, sized to `size` in total
fn walk_ladder(side: Side, available: &[PriceSize], price: Decimal, size: Decimal) -> Vec<PriceSize> {
    let mut remaining = size;
    let mut walk = Vec::new();
    for level in available {
        let crosses = match side {
            Side::Back => level.price >= price,
            Side::Lay => level.price <= price,
        };
        if !crosses || remaining <= Decimal::ZERO {
            break;
        }
        let take = money::round2(remaining.min(level.size));
        if take > Decimal::ZERO {
            walk.push(PriceSize::new(level.price, take));
            remaining -= take;
        }
    }
    walk
}
