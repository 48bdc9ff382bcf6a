//! Error taxonomy for order handling
//!
//! - `Violation`: a trading control rejected an operation before it left
//!   the process. Surfaced to the strategy and logged.
//! - `OrderState`: an operation that the order's type or lifecycle state
//!   does not allow.
//! - `Execution`: the exchange (real or simulated) refused an instruction.
//! - `ExecutionTimeout`: transient, the order returns to `Executable`.
//! - `RetryExhausted`: the worker pool gave up on a package.
//!
//! A price level that does not exist is `None`, never an error.

use super::order_fsm::OrderStatus;
use super::types::{MarketId, OrderId, PackageId, TradeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Instruction-level failure codes returned by an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionErrorCode {
    MarketNotOpenForBetting,
    MarketNotOpenForBspBetting,
    RunnerRemoved,
    InvalidRunner,
    /// The market version moved on between decision and placement
    BetLapsedPriceImprovementTooLarge,
    BetTakenOrLapsed,
    InvalidPersistenceType,
    NoActionRequired,
    InvalidBetSize,
    ErrorInOrder,
}

impl InstructionErrorCode {
    /// Whether a placement failing with this code voids the order rather
    /// than lapsing it
    pub fn voids_order(&self) -> bool {
        matches!(self, InstructionErrorCode::RunnerRemoved)
    }
}

impl fmt::Display for InstructionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InstructionErrorCode::MarketNotOpenForBetting => "MARKET_NOT_OPEN_FOR_BETTING",
            InstructionErrorCode::MarketNotOpenForBspBetting => "MARKET_NOT_OPEN_FOR_BSP_BETTING",
            InstructionErrorCode::RunnerRemoved => "RUNNER_REMOVED",
            InstructionErrorCode::InvalidRunner => "INVALID_RUNNER",
            InstructionErrorCode::BetLapsedPriceImprovementTooLarge => {
                "BET_LAPSED_PRICE_IMPROVEMENT_TOO_LARGE"
            }
            InstructionErrorCode::BetTakenOrLapsed => "BET_TAKEN_OR_LAPSED",
            InstructionErrorCode::InvalidPersistenceType => "INVALID_PERSISTENCE_TYPE",
            InstructionErrorCode::NoActionRequired => "NO_ACTION_REQUIRED",
            InstructionErrorCode::InvalidBetSize => "INVALID_BET_SIZE",
            InstructionErrorCode::ErrorInOrder => "ERROR_IN_ORDER",
        };
        f.write_str(text)
    }
}

/// Errors raised by the order, transaction and execution layers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaddockError {
    #[error("{control} rejected order {order_id}: {reason}")]
    Violation {
        control: String,
        order_id: OrderId,
        reason: String,
    },

    #[error("order {order_id} cannot {operation} while {status}")]
    OrderState {
        order_id: OrderId,
        operation: &'static str,
        status: OrderStatus,
    },

    #[error("order {order_id} failed on exchange: {code}")]
    Execution {
        order_id: OrderId,
        code: InstructionErrorCode,
    },

    #[error("package {package_id} timed out")]
    ExecutionTimeout { package_id: PackageId },

    #[error("package {package_id} gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        package_id: PackageId,
        attempts: u32,
        last_error: String,
    },

    #[error("transaction aborted after a control violation")]
    TransactionAborted,

    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("trade {0} not found")]
    UnknownTrade(TradeId),

    #[error("market {0} not found")]
    UnknownMarket(MarketId),

    #[error("order {0} already registered")]
    DuplicateOrder(OrderId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PaddockError {
    /// Transient failures are retried locally and never surface to the
    /// strategy
    pub fn is_transient(&self) -> bool {
        matches!(self, PaddockError::ExecutionTimeout { .. })
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            PaddockError::Violation { order_id, .. }
            | PaddockError::OrderState { order_id, .. }
            | PaddockError::Execution { order_id, .. } => Some(*order_id),
            PaddockError::UnknownOrder(order_id) | PaddockError::DuplicateOrder(order_id) => {
                Some(*order_id)
            }
            _ => None,
        }
    }
}

pub type PaddockResult<T> = std::result::Result<T, PaddockError>;
