//! Exchange responses and execution events

use crate::core::{BetId, InstructionErrorCode, MarketId, OrderId, PackageId, PaddockError};
use crate::order::{Order, PackageType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionStatus {
    Success,
    Failure,
    Timeout,
}

/// Exchange response to one instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionReport {
    pub order_id: OrderId,
    pub status: InstructionStatus,
    pub error_code: Option<InstructionErrorCode>,
    pub bet_id: Option<BetId>,
    pub placed_at_ms: Option<u64>,
    pub size_matched: Decimal,
    pub average_price_matched: Option<Decimal>,
    pub size_cancelled: Decimal,
}

impl InstructionReport {
    /// Successful response reflecting the order's current ledger
    pub fn success(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: InstructionStatus::Success,
            error_code: None,
            bet_id: order.bet_id,
            placed_at_ms: order.placed_at_ms,
            size_matched: order.size_matched(),
            average_price_matched: order.average_price_matched(),
            size_cancelled: Decimal::ZERO,
        }
    }

    pub fn cancelled(order: &Order, size_cancelled: Decimal) -> Self {
        Self {
            size_cancelled,
            ..Self::success(order)
        }
    }

    pub fn failure(order_id: OrderId, code: InstructionErrorCode) -> Self {
        Self {
            order_id,
            status: InstructionStatus::Failure,
            error_code: Some(code),
            bet_id: None,
            placed_at_ms: None,
            size_matched: Decimal::ZERO,
            average_price_matched: None,
            size_cancelled: Decimal::ZERO,
        }
    }

    pub fn timeout(order_id: OrderId) -> Self {
        Self {
            status: InstructionStatus::Timeout,
            error_code: None,
            ..Self::failure(order_id, InstructionErrorCode::ErrorInOrder)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InstructionStatus::Success
    }
}

/// Outcome of a package on the live worker pool, fed back to the
/// dispatcher as an ordinary event
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(Vec<InstructionReport>),
    Failed(PaddockError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionEvent {
    pub package_id: PackageId,
    pub market_id: MarketId,
    pub package_type: PackageType,
    pub order_ids: Vec<OrderId>,
    pub attempts: u32,
    pub outcome: ExecutionOutcome,
}
