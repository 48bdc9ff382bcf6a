//! Worst-case profit and loss per selection and per market
//!
//! Unmatched size is assumed to match at its resting price, the worst case
//! for exposure. Starting-price orders that have not reconciled count their
//! full liability on the side they can lose: a back on the runner losing, a
//! lay on the runner winning.
//!
//! Market exposure treats outcomes as mutually exclusive. Every selection's
//! lose-case figure is summed, then the `N` smallest `win − lose` swings are
//! added for the `N` runners that can win.

use crate::core::{money, OrderId, OrderStatus, SelectionKey, Side, StrategyId};
use crate::data::MarketBook;
use crate::markets::Market;
use crate::order::{Order, OrderType};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Exposure figures of one strategy on one selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionExposure {
    pub matched_profit_if_win: Decimal,
    pub matched_profit_if_lose: Decimal,
    pub worst_potential_unmatched_profit_if_win: Decimal,
    pub worst_potential_unmatched_profit_if_lose: Decimal,
    pub worst_possible_profit_on_win: Decimal,
    pub worst_possible_profit_on_lose: Decimal,
}

impl SelectionExposure {
    /// Largest loss across the two outcomes, zero when both are profitable
    pub fn exposure(&self) -> Decimal {
        (-self
            .worst_possible_profit_on_win
            .min(self.worst_possible_profit_on_lose))
        .max(Decimal::ZERO)
    }

    /// Swing between the win and lose outcomes
    pub fn delta(&self) -> Decimal {
        self.worst_possible_profit_on_win - self.worst_possible_profit_on_lose
    }
}

/// Accumulates legs into a `SelectionExposure`
#[derive(Debug, Clone, Default)]
pub struct ExposureCalculator {
    matched_back: Vec<(Decimal, Decimal)>,
    matched_lay: Vec<(Decimal, Decimal)>,
    unmatched_back: Vec<(Decimal, Decimal)>,
    unmatched_lay: Vec<(Decimal, Decimal)>,
    sp_back_liability: Decimal,
    sp_lay_liability: Decimal,
}

impl ExposureCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the matched and working parts of an order
    pub fn add_order(&mut self, order: &Order) {
        if let Some(price) = order.average_price_matched() {
            self.add_matched(order.side, price, order.size_matched());
        }
        match &order.order_type {
            OrderType::Limit(limit) => {
                self.add_unmatched(order.side, limit.price, order.size_remaining());
            }
            OrderType::LimitOnClose { .. } | OrderType::MarketOnClose { .. } => {
                self.add_starting_price(order.side, order.size_remaining());
            }
        }
    }

    pub fn add_matched(&mut self, side: Side, price: Decimal, size: Decimal) {
        if size <= Decimal::ZERO {
            return;
        }
        match side {
            Side::Back => self.matched_back.push((price, size)),
            Side::Lay => self.matched_lay.push((price, size)),
        }
    }

    /// Working size, assumed to match at `price`
    pub fn add_unmatched(&mut self, side: Side, price: Decimal, size: Decimal) {
        if size <= Decimal::ZERO {
            return;
        }
        match side {
            Side::Back => self.unmatched_back.push((price, size)),
            Side::Lay => self.unmatched_lay.push((price, size)),
        }
    }

    /// Liability of a starting-price order still awaiting reconciliation
    pub fn add_starting_price(&mut self, side: Side, liability: Decimal) {
        match side {
            Side::Back => self.sp_back_liability += liability,
            Side::Lay => self.sp_lay_liability += liability,
        }
    }

    pub fn finish(&self) -> SelectionExposure {
        let win_on = |legs: &[(Decimal, Decimal)]| -> Decimal {
            legs.iter().map(|(p, s)| (*p - Decimal::ONE) * *s).sum()
        };
        let stake = |legs: &[(Decimal, Decimal)]| -> Decimal { legs.iter().map(|(_, s)| *s).sum() };

        let matched_profit_if_win = money::round2(win_on(&self.matched_back) - win_on(&self.matched_lay));
        let matched_profit_if_lose = money::round2(stake(&self.matched_lay) - stake(&self.matched_back));
        let worst_potential_unmatched_profit_if_win = money::round2(-win_on(&self.unmatched_lay));
        let worst_potential_unmatched_profit_if_lose = money::round2(-stake(&self.unmatched_back));

        SelectionExposure {
            matched_profit_if_win,
            matched_profit_if_lose,
            worst_potential_unmatched_profit_if_win,
            worst_potential_unmatched_profit_if_lose,
            worst_possible_profit_on_win: money::round2(
                matched_profit_if_win + worst_potential_unmatched_profit_if_win - self.sp_lay_liability,
            ),
            worst_possible_profit_on_lose: money::round2(
                matched_profit_if_lose + worst_potential_unmatched_profit_if_lose - self.sp_back_liability,
            ),
        }
    }
}

/// Whether an order counts toward exposure
///
/// Pending orders have not reached the exchange yet; the control that
/// validates one adds it as a hypothetical leg instead.
fn counts(order: &Order, exclude: Option<OrderId>) -> bool {
    !matches!(order.status(), OrderStatus::Pending | OrderStatus::Violation) && Some(order.id) != exclude
}

/// Exposure of `orders`, skipping pending orders, violations and `exclude`
pub fn selection_exposure<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    exclude: Option<OrderId>,
) -> SelectionExposure {
    calculator_for(orders, exclude).finish()
}

/// Calculator seeded with `orders`, for adding hypothetical legs
pub fn calculator_for<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    exclude: Option<OrderId>,
) -> ExposureCalculator {
    let mut calculator = ExposureCalculator::new();
    for order in orders.into_iter().filter(|o| counts(o, exclude)) {
        calculator.add_order(order);
    }
    calculator
}

/// Exposure of one strategy on one selection of a market
pub fn strategy_selection_exposure(
    market: &Market,
    strategy: &StrategyId,
    selection: SelectionKey,
    exclude: Option<OrderId>,
) -> SelectionExposure {
    selection_exposure(market.strategy_selection_orders(strategy, selection), exclude)
}

/// Per-selection exposure of everything one strategy holds in a market
pub fn strategy_exposures(market: &Market, strategy: &StrategyId) -> BTreeMap<SelectionKey, SelectionExposure> {
    let mut calculators: BTreeMap<SelectionKey, ExposureCalculator> = BTreeMap::new();
    for order in market.strategy_orders(strategy).filter(|o| counts(o, None)) {
        calculators.entry(order.selection).or_default().add_order(order);
    }
    calculators
        .into_iter()
        .map(|(selection, calculator)| (selection, calculator.finish()))
        .collect()
}

/// Worst-case profit across mutually exclusive outcomes of a market
///
/// Active runners without orders contribute zero to both sums; only `N`
/// runners can win, so the `N` smallest swings are applied.
pub fn worst_market_profit(book: &MarketBook, exposures: &BTreeMap<SelectionKey, SelectionExposure>) -> Decimal {
    let mut selections: BTreeMap<SelectionKey, SelectionExposure> =
        book.active_runners().map(|r| (r.key(), SelectionExposure::default())).collect();
    for (key, exposure) in exposures {
        selections.insert(*key, *exposure);
    }

    let lose_total: Decimal = selections.values().map(|e| e.worst_possible_profit_on_lose).sum();
    let mut deltas: Vec<Decimal> = selections.values().map(SelectionExposure::delta).collect();
    deltas.sort();
    let winners = book.number_of_winners.max(1) as usize;
    let worst_swings: Decimal = deltas.iter().take(winners).sum();
    money::round2(lose_total + worst_swings)
}

/// Market exposure of one strategy: worst-case loss, zero if none
pub fn strategy_market_exposure(market: &Market, strategy: &StrategyId) -> Decimal {
    let worst = worst_market_profit(market.book(), &strategy_exposures(market, strategy));
    (-worst).max(Decimal::ZERO)
}
