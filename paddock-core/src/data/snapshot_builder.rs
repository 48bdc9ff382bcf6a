//! Fluent builder for `MarketBook` snapshots
//!
//! Used by tests, benches and the demo binary to assemble snapshots without
//! spelling out every field.
//!
//! # Example
//!
//! ```rust
//! use paddock_core::data::MarketBookBuilder;
//! use rust_decimal_macros::dec;
//!
//! let book = MarketBookBuilder::new("1.234")
//!     .publish_time(1_000)
//!     .version(3)
//!     .runner(101, |r| r.back(dec!(2.0), dec!(20)).lay(dec!(2.02), dec!(15)))
//!     .runner(102, |r| r.traded(dec!(3.5), dec!(40)))
//!     .build();
//!
//! assert_eq!(book.runners.len(), 2);
//! ```

use super::types::{
    ExchangePrices, MarketBook, MarketStatus, PriceSize, RunnerBook, RunnerStatus,
    StartingPrices,
};
use crate::core::MarketId;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct MarketBookBuilder {
    book: MarketBook,
}

impl MarketBookBuilder {
    pub fn new(market_id: &str) -> Self {
        Self {
            book: MarketBook {
                market_id: MarketId::new(market_id),
                publish_time_ms: 0,
                event_id: None,
                status: MarketStatus::Open,
                inplay: false,
                version: 1,
                bet_delay: 0,
                bsp_market: false,
                bsp_reconciled: false,
                persistence_enabled: true,
                number_of_winners: 1,
                number_of_active_runners: 0,
                market_base_rate: None,
                each_way_divisor: None,
                runners: Vec::new(),
            },
        }
    }

    /// Start from an existing snapshot
    pub fn from_book(book: &MarketBook) -> Self {
        Self { book: book.clone() }
    }

    pub fn publish_time(mut self, publish_time_ms: u64) -> Self {
        self.book.publish_time_ms = publish_time_ms;
        self
    }

    pub fn event(mut self, event_id: &str) -> Self {
        self.book.event_id = Some(event_id.to_string());
        self
    }

    pub fn status(mut self, status: MarketStatus) -> Self {
        self.book.status = status;
        self
    }

    pub fn inplay(mut self, inplay: bool) -> Self {
        self.book.inplay = inplay;
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.book.version = version;
        self
    }

    pub fn bet_delay(mut self, seconds: u32) -> Self {
        self.book.bet_delay = seconds;
        self
    }

    pub fn bsp_market(mut self, bsp_market: bool) -> Self {
        self.book.bsp_market = bsp_market;
        self
    }

    pub fn bsp_reconciled(mut self, reconciled: bool) -> Self {
        self.book.bsp_reconciled = reconciled;
        self
    }

    pub fn persistence_enabled(mut self, enabled: bool) -> Self {
        self.book.persistence_enabled = enabled;
        self
    }

    pub fn number_of_winners(mut self, winners: u32) -> Self {
        self.book.number_of_winners = winners;
        self
    }

    pub fn market_base_rate(mut self, percent: Decimal) -> Self {
        self.book.market_base_rate = Some(percent);
        self
    }

    pub fn each_way_divisor(mut self, divisor: Decimal) -> Self {
        self.book.each_way_divisor = Some(divisor);
        self
    }

    /// Add a runner with zero handicap, configured by `f`
    pub fn runner(self, selection_id: u64, f: impl FnOnce(RunnerBuilder) -> RunnerBuilder) -> Self {
        self.runner_with_handicap(selection_id, Decimal::ZERO, f)
    }

    pub fn runner_with_handicap(
        mut self,
        selection_id: u64,
        handicap: Decimal,
        f: impl FnOnce(RunnerBuilder) -> RunnerBuilder,
    ) -> Self {
        let runner = f(RunnerBuilder::new(selection_id, handicap)).build();
        self.book.runners.push(runner);
        self
    }

    /// Replace the runner with the same selection id, or add it
    pub fn update_runner(
        mut self,
        selection_id: u64,
        f: impl FnOnce(RunnerBuilder) -> RunnerBuilder,
    ) -> Self {
        if let Some(pos) = self
            .book
            .runners
            .iter()
            .position(|r| r.selection_id == selection_id)
        {
            let existing = self.book.runners[pos].clone();
            self.book.runners[pos] = f(RunnerBuilder { runner: existing }).build();
            self
        } else {
            self.runner(selection_id, f)
        }
    }

    pub fn build(mut self) -> MarketBook {
        self.book.number_of_active_runners = self
            .book
            .runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Active)
            .count() as u32;
        self.book
    }
}

#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    runner: RunnerBook,
}

impl RunnerBuilder {
    fn new(selection_id: u64, handicap: Decimal) -> Self {
        Self {
            runner: RunnerBook {
                selection_id,
                handicap,
                status: RunnerStatus::Active,
                adjustment_factor: None,
                last_price_traded: None,
                total_matched: Decimal::ZERO,
                ex: ExchangePrices::default(),
                sp: StartingPrices::default(),
            },
        }
    }

    pub fn status(mut self, status: RunnerStatus) -> Self {
        self.runner.status = status;
        self
    }

    pub fn adjustment_factor(mut self, factor: Decimal) -> Self {
        self.runner.adjustment_factor = Some(factor);
        self
    }

    /// Append a level to available-to-back (callers add best first)
    pub fn back(mut self, price: Decimal, size: Decimal) -> Self {
        self.runner.ex.available_to_back.push(PriceSize::new(price, size));
        self
    }

    /// Append a level to available-to-lay (callers add best first)
    pub fn lay(mut self, price: Decimal, size: Decimal) -> Self {
        self.runner.ex.available_to_lay.push(PriceSize::new(price, size));
        self
    }

    /// Set cumulative traded volume at `price`
    pub fn traded(mut self, price: Decimal, size: Decimal) -> Self {
        let ladder = &mut self.runner.ex.traded_volume;
        match ladder.iter_mut().find(|l| l.price == price) {
            Some(level) => level.size = size,
            None => ladder.push(PriceSize::new(price, size)),
        }
        self.runner.last_price_traded = Some(price);
        self.runner.total_matched = ladder.iter().map(|l| l.size).sum();
        self
    }

    pub fn clear_ladders(mut self) -> Self {
        self.runner.ex.available_to_back.clear();
        self.runner.ex.available_to_lay.clear();
        self
    }

    pub fn actual_sp(mut self, sp: Decimal) -> Self {
        self.runner.sp.actual_sp = Some(sp);
        self
    }

    pub fn near_far(mut self, near: Decimal, far: Decimal) -> Self {
        self.runner.sp.near_price = Some(near);
        self.runner.sp.far_price = Some(far);
        self
    }

    pub fn build(self) -> RunnerBook {
        self.runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_defaults() {
        let book = MarketBookBuilder::new("1.5").build();
        assert_eq!(book.market_id.as_str(), "1.5");
        assert!(book.is_open());
        assert_eq!(book.version, 1);
        assert_eq!(book.number_of_winners, 1);
    }

    #[test]
    fn test_traded_accumulates_total() {
        let book = MarketBookBuilder::new("1.5")
            .runner(1, |r| r.traded(dec!(2.0), dec!(10)).traded(dec!(2.02), dec!(4)))
            .build();
        let runner = &book.runners[0];
        assert_eq!(runner.total_matched, dec!(14));
        assert_eq!(runner.last_price_traded, Some(dec!(2.02)));
    }

    #[test]
    fn test_update_runner_overwrites_level() {
        let book = MarketBookBuilder::new("1.5")
            .runner(1, |r| r.traded(dec!(2.0), dec!(10)))
            .update_runner(1, |r| r.traded(dec!(2.0), dec!(30)))
            .build();
        assert_eq!(book.runners.len(), 1);
        assert_eq!(book.runners[0].ex.traded_volume[0].size, dec!(30));
    }

    #[test]
    fn test_active_runner_count() {
        let book = MarketBookBuilder::new("1.5")
            .runner(1, |r| r)
            .runner(2, |r| r.status(RunnerStatus::Removed))
            .build();
        assert_eq!(book.number_of_active_runners, 1);
    }
}
