//! Simulated exchange for backtests
//!
//! Packages submitted by transactions wait in `SimulatedQueue` until their
//! simulated network latency (plus the exchange bet delay for places and
//! replaces) has elapsed on the virtual clock. The backtest loop then hands
//! each ready package to `SimulatedExchange`, which runs it through the
//! matching engine against the market's current snapshot.

use super::reconcile::{accept, resolve_instruction};
use super::types::InstructionReport;
use super::PackageSink;
use crate::config::SimulationConfig;
use crate::core::{IdSequence, InstructionErrorCode, PaddockResult};
use crate::markets::Market;
use crate::order::{InstructionAction, OrderPackage, PackageType};
use crate::simulation::MatchingEngine;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A submitted package and the virtual time it reaches the exchange
#[derive(Debug, Clone)]
pub struct DelayedPackage {
    pub ready_at_ms: u64,
    pub package: OrderPackage,
}

/// Latency queue between transactions and the simulated exchange
#[derive(Debug, Default)]
pub struct SimulatedQueue {
    config: SimulationConfig,
    queue: VecDeque<DelayedPackage>,
    submitted: u64,
}

impl SimulatedQueue {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            submitted: 0,
        }
    }

    fn latency_ms(&self, package_type: PackageType) -> u64 {
        match package_type {
            PackageType::Place => self.config.place_latency_ms,
            PackageType::Cancel => self.config.cancel_latency_ms,
            PackageType::Update => self.config.update_latency_ms,
            PackageType::Replace => self.config.replace_latency_ms,
        }
    }

    /// Remove and return, in submission order, every package due by `now_ms`
    pub fn take_ready(&mut self, now_ms: u64) -> Vec<OrderPackage> {
        let mut ready = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.queue.len());
        for delayed in self.queue.drain(..) {
            if delayed.ready_at_ms <= now_ms {
                ready.push(delayed.package);
            } else {
                waiting.push_back(delayed);
            }
        }
        self.queue = waiting;
        ready
    }

    /// Remove every package regardless of its delay
    pub fn take_all(&mut self) -> Vec<OrderPackage> {
        self.queue.drain(..).map(|d| d.package).collect()
    }

    /// Drop the packages of a market that no longer exists
    pub fn forget(&mut self, market_id: &crate::core::MarketId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|d| &d.package.market_id != market_id);
        before - self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Packages submitted since creation
    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

impl PackageSink for SimulatedQueue {
    fn submit(&mut self, package: OrderPackage) {
        let mut delay = self.latency_ms(package.package_type);
        if self.config.apply_bet_delay && package.is_delayed_by_exchange() {
            delay += u64::from(package.bet_delay) * 1_000;
        }
        let ready_at_ms = package.created_at_ms + delay;
        trace!(package_id = %package.id, ready_at_ms, "package queued");
        self.submitted += 1;
        self.queue.push_back(DelayedPackage { ready_at_ms, package });
    }
}

/// Executes packages against a market with the matching engine
#[derive(Debug)]
pub struct SimulatedExchange {
    engine: MatchingEngine,
    bet_ids: IdSequence,
}

impl SimulatedExchange {
    pub fn new(engine: MatchingEngine) -> Self {
        Self {
            engine,
            bet_ids: IdSequence::starting_at(1),
        }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// Run every instruction of `package`, resolving each order
    ///
    /// Instructions for orders that completed while the package was in
    /// flight are answered with `BetTakenOrLapsed` and left alone.
    pub fn execute(
        &mut self,
        market: &mut Market,
        package: &OrderPackage,
        now_ms: u64,
    ) -> PaddockResult<Vec<InstructionReport>> {
        let mut reports = Vec::with_capacity(package.len());
        for instruction in &package.instructions {
            let order_id = instruction.order_id;
            if market.order(order_id).map_or(true, |o| o.is_terminal()) {
                debug!(order_id = %order_id, "instruction for completed order");
                reports.push(InstructionReport::failure(order_id, InstructionErrorCode::BetTakenOrLapsed));
                continue;
            }

            let report = {
                let mut parts = market.parts_mut();
                let book = parts.book;
                let Some(order) = parts.order_mut(order_id) else {
                    continue;
                };
                match instruction.action {
                    InstructionAction::Place => {
                        self.engine.place(order, book, self.bet_ids.next_bet(), now_ms)
                    }
                    InstructionAction::Cancel { size_reduction } => {
                        self.engine.cancel(order, book, size_reduction)
                    }
                    InstructionAction::Update { persistence } => {
                        self.engine.update(order, book, persistence)
                    }
                    InstructionAction::Replace { .. } => self.engine.cancel(order, book, None),
                }
            };

            let successor = resolve_instruction(market, &instruction.action, &report, now_ms)?;
            reports.push(report);
            if let Some(successor) = successor {
                reports.push(self.place_successor(market, successor, now_ms)?);
            }
        }
        Ok(reports)
    }

    fn place_successor(
        &mut self,
        market: &mut Market,
        successor: crate::core::OrderId,
        now_ms: u64,
    ) -> PaddockResult<InstructionReport> {
        let report = {
            let mut parts = market.parts_mut();
            let book = parts.book;
            let order = parts
                .order_mut(successor)
                .ok_or(crate::core::PaddockError::UnknownOrder(successor))?;
            self.engine.place(order, book, self.bet_ids.next_bet(), now_ms)
        };
        if report.is_success() {
            accept(market, successor, &report, now_ms)?;
        } else {
            resolve_instruction(market, &InstructionAction::Place, &report, now_ms)?;
        }
        Ok(report)
    }
}
