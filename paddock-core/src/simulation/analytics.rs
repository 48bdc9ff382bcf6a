//! Per-runner traded-volume tracking
//!
//! The exchange publishes cumulative traded volume per price. Matching needs
//! only what traded since the previous snapshot, so each runner keeps the
//! last ladder and reports the positive difference.

use crate::core::{money, SelectionKey};
use crate::data::{PriceSize, RunnerBook};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RunnerAnalytics {
    pub selection: SelectionKey,
    previous: HashMap<Decimal, Decimal>,
    previous_ladder: Vec<PriceSize>,
    traded: Vec<PriceSize>,
    middle: Option<Decimal>,
    matched: Decimal,
}

impl RunnerAnalytics {
    /// Seed from the first snapshot of a runner; nothing has traded yet
    pub fn new(runner: &RunnerBook) -> Self {
        let mut analytics = Self {
            selection: runner.key(),
            previous: HashMap::new(),
            previous_ladder: Vec::new(),
            traded: Vec::new(),
            middle: None,
            matched: Decimal::ZERO,
        };
        analytics.remember(runner);
        analytics.middle = middle_price(runner);
        analytics
    }

    /// Compute the traded delta against the previous snapshot
    pub fn update(&mut self, runner: &RunnerBook) {
        if runner.ex.traded_volume == self.previous_ladder {
            self.traded.clear();
            self.matched = Decimal::ZERO;
        } else {
            self.traded = runner
                .ex
                .traded_volume
                .iter()
                .filter_map(|level| {
                    let before = self.previous.get(&level.price).copied().unwrap_or_default();
                    let delta = money::round2(level.size - before);
                    (delta > Decimal::ZERO).then_some(PriceSize::new(level.price, delta))
                })
                .collect();
            self.matched = money::round2(self.traded.iter().map(|l| l.size).sum());
            self.remember(runner);
        }
        self.middle = middle_price(runner);
    }

    fn remember(&mut self, runner: &RunnerBook) {
        self.previous_ladder = runner.ex.traded_volume.clone();
        self.previous = runner
            .ex
            .traded_volume
            .iter()
            .map(|l| (l.price, l.size))
            .collect();
    }

    /// Volume traded since the previous snapshot, in ladder order
    pub fn traded(&self) -> &[PriceSize] {
        &self.traded
    }

    /// Total size traded since the previous snapshot
    pub fn matched(&self) -> Decimal {
        self.matched
    }

    /// Midpoint of best back and best lay
    pub fn middle(&self) -> Option<Decimal> {
        self.middle
    }
}

fn middle_price(runner: &RunnerBook) -> Option<Decimal> {
    match (runner.best_back(), runner.best_lay()) {
        (Some(back), Some(lay)) => Some(money::round2((back.price + lay.price) / Decimal::TWO)),
        _ => None,
    }
}
