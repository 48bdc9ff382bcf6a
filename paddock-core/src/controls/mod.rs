//! Trading controls
//!
//! Every place, cancel, update and replace passes through an ordered chain
//! of controls before it can reach an execution sink:
//!
//! ```text
//! Transaction → MarketValidation → OrderValidation → StrategyExposure → MaxTransactionCount → package
//!               market open        ladder price      order exposure      rolling hourly count
//!               SP rules           stake minimums    selection exposure
//! ```
//!
//! The first failing control wins; its violation names the control and the
//! reason and is surfaced as `PaddockError::Violation`.

pub mod market_validation;
pub mod order_validation;
pub mod strategy_exposure;
pub mod transaction_count;

pub use market_validation::MarketValidation;
pub use order_validation::OrderValidation;
pub use strategy_exposure::StrategyExposure;
pub use transaction_count::MaxTransactionCount;

use crate::config::{ClientConfig, StrategyLimits};
use crate::core::{PaddockError, PaddockResult, SelectionKey};
use crate::data::MarketStatus;
use crate::markets::Market;
use crate::order::{InstructionAction, Order};
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, warn};

/// Everything a control may look at
pub struct ControlContext<'a> {
    pub market: &'a Market,
    pub client: &'a ClientConfig,
    /// Limits of the strategy that owns the order
    pub limits: StrategyLimits,
    pub now_ms: u64,
}

/// Why a control rejected an operation
#[derive(Debug, Clone, PartialEq)]
pub enum ControlViolation {
    MarketClosed,
    MarketNotOpen { status: MarketStatus },
    StartingPriceUnavailable { inplay: bool, bsp_market: bool },
    RunnerNotActive { selection: SelectionKey },
    InvalidPrice { price: Decimal },
    InvalidSize { size: Decimal },
    BelowMinimumStake { size: Decimal, minimum: Decimal },
    BelowMinimumLiability { liability: Decimal, minimum: Decimal },
    OrderExposure { exposure: Decimal, limit: Decimal },
    SelectionExposure { exposure: Decimal, limit: Decimal },
    TransactionLimit { count: u32, limit: u32 },
}

impl fmt::Display for ControlViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlViolation::MarketClosed => write!(f, "Market is closed"),
            ControlViolation::MarketNotOpen { status } => {
                write!(f, "Market status is {:?}", status)
            }
            ControlViolation::StartingPriceUnavailable { inplay, bsp_market } => write!(
                f,
                "Starting price unavailable (bsp_market: {}, inplay: {})",
                bsp_market, inplay
            ),
            ControlViolation::RunnerNotActive { selection } => {
                write!(f, "Runner {} is not active", selection)
            }
            ControlViolation::InvalidPrice { price } => {
                write!(f, "Price {} is not on the ladder", price)
            }
            ControlViolation::InvalidSize { size } => write!(f, "Size {} is invalid", size),
            ControlViolation::BelowMinimumStake { size, minimum } => {
                write!(f, "Size {} is below minimum {}", size, minimum)
            }
            ControlViolation::BelowMinimumLiability { liability, minimum } => write!(
                f,
                "Liability {} is below minimum {}",
                liability, minimum
            ),
            ControlViolation::OrderExposure { exposure, limit } => write!(
                f,
                "Order exposure {} would exceed limit {}",
                exposure, limit
            ),
            ControlViolation::SelectionExposure { exposure, limit } => write!(
                f,
                "Potential selection exposure {} would exceed limit {}",
                exposure, limit
            ),
            ControlViolation::TransactionLimit { count, limit } => write!(
                f,
                "Transaction count {} would exceed {} per hour",
                count, limit
            ),
        }
    }
}

pub trait TradingControl {
    fn name(&self) -> &'static str;

    /// Check one operation on `order`
    fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        order: &Order,
        action: &InstructionAction,
    ) -> Result<(), ControlViolation>;

    /// Instructions left the transaction for execution
    fn on_executed(&mut self, _instructions: u32, _now_ms: u64) {}

    /// Validated instructions were dropped by an aborted transaction
    fn on_aborted(&mut self, _instructions: u32) {}
}

/// Ordered chain of controls
#[derive(Default)]
pub struct ControlChain {
    controls: Vec<Box<dyn TradingControl>>,
}

impl ControlChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Market, order, exposure and transaction-count controls, in that order
    pub fn with_defaults(client: &ClientConfig) -> Self {
        let mut chain = Self::new();
        chain.push(MarketValidation);
        chain.push(OrderValidation);
        chain.push(StrategyExposure);
        chain.push(MaxTransactionCount::new(client.max_transactions_per_hour));
        chain
    }

    pub fn push(&mut self, control: impl TradingControl + 'static) {
        self.controls.push(Box::new(control));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.controls.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Run every control in order, stopping at the first violation
    pub fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        order: &Order,
        action: &InstructionAction,
    ) -> PaddockResult<()> {
        for control in &mut self.controls {
            if let Err(violation) = control.validate(ctx, order, action) {
                warn!(
                    control = control.name(),
                    order_id = %order.id,
                    %violation,
                    "control violation"
                );
                return Err(PaddockError::Violation {
                    control: control.name().to_string(),
                    order_id: order.id,
                    reason: violation.to_string(),
                });
            }
        }
        debug!(order_id = %order.id, action = ?action.package_type(), "controls passed");
        Ok(())
    }

    pub fn on_executed(&mut self, instructions: u32, now_ms: u64) {
        for control in &mut self.controls {
            control.on_executed(instructions, now_ms);
        }
    }

    pub fn on_aborted(&mut self, instructions: u32) {
        for control in &mut self.controls {
            control.on_aborted(instructions);
        }
    }
}

impl fmt::Debug for ControlChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChain").field("controls", &self.names()).finish()
    }
}
