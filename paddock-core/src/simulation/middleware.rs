//! Per-snapshot processing of simulated markets
//!
//! Runs after a snapshot has been applied to its market and before any
//! strategy sees it:
//!
//! 1. refresh runner analytics (traded-volume deltas)
//! 2. handle runners removed since the last snapshot
//! 3. advance every live order through the matching engine

use super::analytics::RunnerAnalytics;
use super::matching::MatchingEngine;
use crate::core::{MarketId, OrderStatus, PaddockResult, SelectionKey};
use crate::data::RunnerStatus;
use crate::markets::{Market, MarketParts};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, trace};

#[derive(Debug)]
pub struct SimulationMiddleware {
    engine: MatchingEngine,
    /// Removals already applied, per market
    removals: HashMap<MarketId, BTreeSet<SelectionKey>>,
}

impl SimulationMiddleware {
    pub fn new(engine: MatchingEngine) -> Self {
        Self {
            engine,
            removals: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn process(&mut self, market: &mut Market, now_ms: u64) -> PaddockResult<()> {
        update_analytics(market);
        self.process_removals(market, now_ms)?;
        self.advance_orders(market, now_ms)
    }

    /// Drop per-market state once a market is evicted
    pub fn forget(&mut self, market_id: &MarketId) {
        self.removals.remove(market_id);
    }

    fn process_removals(&mut self, market: &mut Market, now_ms: u64) -> PaddockResult<()> {
        let seen = self.removals.entry(market.market_id.clone()).or_default();
        let newly_removed: Vec<(SelectionKey, Option<Decimal>)> = market
            .book()
            .runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Removed && !seen.contains(&r.key()))
            .map(|r| (r.key(), r.adjustment_factor))
            .collect();

        for (removed, adjustment_factor) in newly_removed {
            seen.insert(removed);
            info!(
                market_id = %market.market_id,
                selection = %removed,
                adjustment_factor = ?adjustment_factor,
                "runner removed"
            );
            let ids: Vec<_> = market.blotter.order_ids().to_vec();
            for id in ids {
                let Some(order) = market.order_mut(id) else {
                    continue;
                };
                if matches!(order.status(), OrderStatus::Voided | OrderStatus::Violation) {
                    continue;
                }
                if order.selection == removed {
                    order.void_all();
                } else if order.placed_at_ms.is_some() {
                    if let Some(af) = adjustment_factor.filter(|af| *af > Decimal::ZERO) {
                        order.reduce_matched_prices(af);
                    }
                    if !order.is_terminal() {
                        let remaining = order.size_remaining();
                        order.record_lapse(remaining);
                    }
                }
                market.on_order_changed(id, now_ms)?;
            }
        }
        Ok(())
    }

    fn advance_orders(&self, market: &mut Market, now_ms: u64) -> PaddockResult<()> {
        let live = market.live_order_ids();
        let mut changed = Vec::new();
        {
            let MarketParts {
                book,
                analytics,
                trades,
                blotter,
            } = market.parts_mut();
            for id in live {
                let Some(order_ref) = blotter.get(id) else {
                    continue;
                };
                let Some(order) = trades.get_mut(order_ref) else {
                    continue;
                };
                if !order.status().is_working() {
                    continue;
                }
                let traded = analytics
                    .get(&order.selection)
                    .map(RunnerAnalytics::traded)
                    .unwrap_or(&[]);
                trace!(order_id = %id, levels = traded.len(), "advance");
                self.engine.advance(order, book, traded, now_ms);
                changed.push(id);
            }
        }
        for id in changed {
            market.on_order_changed(id, now_ms)?;
        }
        Ok(())
    }
}

fn update_analytics(market: &mut Market) {
    let MarketParts { book, analytics, .. } = market.parts_mut();
    for runner in &book.runners {
        analytics
            .entry(runner.key())
            .and_modify(|a| a.update(runner))
            .or_insert_with(|| RunnerAnalytics::new(runner));
    }
}
