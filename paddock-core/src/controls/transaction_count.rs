//! Client-level ceiling on transactions per rolling hour
//!
//! Every instruction that leaves a transaction counts as one exchange
//! transaction. Validated instructions are reserved until the transaction
//! executes (counted at that moment) or aborts (released). Time is the
//! virtual clock passed in by the caller.

use super::{ControlContext, ControlViolation, TradingControl};
use crate::config::constants::TRANSACTION_WINDOW_MS;
use crate::order::{InstructionAction, Order};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MaxTransactionCount {
    limit: u32,
    /// (executed at, instructions) inside the window
    executed: VecDeque<(u64, u32)>,
    reserved: u32,
}

impl MaxTransactionCount {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            executed: VecDeque::new(),
            reserved: 0,
        }
    }

    /// Transactions counted against the window ending at `now_ms`
    ///
    /// Entries later than `now_ms` belong to a replay that ran ahead of a
    /// clock restart and are dropped too.
    pub fn current(&mut self, now_ms: u64) -> u32 {
        self.executed
            .retain(|&(at, _)| at <= now_ms && now_ms - at < TRANSACTION_WINDOW_MS);
        self.executed.iter().map(|(_, n)| n).sum::<u32>() + self.reserved
    }
}

impl TradingControl for MaxTransactionCount {
    fn name(&self) -> &'static str {
        "MAX_TRANSACTION_COUNT"
    }

    fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        _order: &Order,
        _action: &InstructionAction,
    ) -> Result<(), ControlViolation> {
        let count = self.current(ctx.now_ms) + 1;
        if count > self.limit {
            return Err(ControlViolation::TransactionLimit {
                count,
                limit: self.limit,
            });
        }
        self.reserved += 1;
        Ok(())
    }

    fn on_executed(&mut self, instructions: u32, now_ms: u64) {
        if instructions == 0 {
            return;
        }
        self.reserved = self.reserved.saturating_sub(instructions);
        self.executed.push_back((now_ms, instructions));
        debug!(instructions, now_ms, "transactions counted");
    }

    fn on_aborted(&mut self, instructions: u32) {
        self.reserved = self.reserved.saturating_sub(instructions);
    }
}
