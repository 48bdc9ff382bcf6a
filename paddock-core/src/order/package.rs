//! Order packages: self-contained batches of instructions for one market
//!
//! A package carries everything an execution sink needs, so it can cross a
//! thread boundary to the live worker pool without touching the blotter.

use super::order::Order;
use super::order_type::{OrderType, PersistenceType};
use crate::core::{BetId, ClientId, MarketId, OrderId, PackageId, SelectionKey, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
    Place,
    Cancel,
    Update,
    Replace,
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageType::Place => write!(f, "PLACE"),
            PackageType::Cancel => write!(f, "CANCEL"),
            PackageType::Update => write!(f, "UPDATE"),
            PackageType::Replace => write!(f, "REPLACE"),
        }
    }
}

/// What to do with an order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionAction {
    Place,
    /// Cancel `size_reduction`, or everything remaining when `None`
    Cancel { size_reduction: Option<Decimal> },
    Update { persistence: PersistenceType },
    Replace { new_price: Decimal },
}

impl InstructionAction {
    pub fn package_type(&self) -> PackageType {
        match self {
            InstructionAction::Place => PackageType::Place,
            InstructionAction::Cancel { .. } => PackageType::Cancel,
            InstructionAction::Update { .. } => PackageType::Update,
            InstructionAction::Replace { .. } => PackageType::Replace,
        }
    }
}

/// One instruction, with a copy of the order fields it needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub order_id: OrderId,
    pub bet_id: Option<BetId>,
    pub selection: SelectionKey,
    pub side: Side,
    pub order_type: OrderType,
    pub action: InstructionAction,
}

impl Instruction {
    pub fn for_order(order: &Order, action: InstructionAction) -> Self {
        Self {
            order_id: order.id,
            bet_id: order.bet_id,
            selection: order.selection,
            side: order.side,
            order_type: order.order_type,
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPackage {
    pub id: PackageId,
    pub market_id: MarketId,
    pub client: ClientId,
    pub package_type: PackageType,
    pub instructions: Vec<Instruction>,
    /// Version every place instruction in the package was priced against
    pub market_version: Option<u64>,
    /// Exchange bet delay (seconds) at the time of submission
    pub bet_delay: u32,
    pub created_at_ms: u64,
    /// Execution attempts so far (live mode)
    pub attempts: u32,
}

impl OrderPackage {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn order_ids(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.instructions.iter().map(|i| i.order_id)
    }

    /// Whether the exchange's bet delay applies to this package
    pub fn is_delayed_by_exchange(&self) -> bool {
        matches!(self.package_type, PackageType::Place | PackageType::Replace)
    }
}

impl fmt::Display for OrderPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} market={} instructions={}",
            self.package_type,
            self.id,
            self.market_id,
            self.instructions.len()
        )
    }
}

/// Maximum instructions per package, per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLimits {
    pub place: usize,
    pub cancel: usize,
    pub update: usize,
    pub replace: usize,
}

impl Default for PackageLimits {
    fn default() -> Self {
        use crate::config::constants::{
            CANCEL_PACKAGE_LIMIT, PLACE_PACKAGE_LIMIT, REPLACE_PACKAGE_LIMIT,
            UPDATE_PACKAGE_LIMIT,
        };
        Self {
            place: PLACE_PACKAGE_LIMIT,
            cancel: CANCEL_PACKAGE_LIMIT,
            update: UPDATE_PACKAGE_LIMIT,
            replace: REPLACE_PACKAGE_LIMIT,
        }
    }
}

impl PackageLimits {
    pub fn for_type(&self, package_type: PackageType) -> usize {
        let limit = match package_type {
            PackageType::Place => self.place,
            PackageType::Cancel => self.cancel,
            PackageType::Update => self.update,
            PackageType::Replace => self.replace,
        };
        limit.max(1)
    }
}
