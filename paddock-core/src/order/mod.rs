//! Order and trade model
//!
//! Trades own orders; packages carry copies of order fields to execution.

#[allow(clippy::module_inception)]
pub mod order;
pub mod order_type;
pub mod package;
pub mod trade;

pub use order::{Fill, Order, Settlement, SimulatedState};
pub use order_type::{LimitOrder, OrderType, PersistenceType, TimeInForce};
pub use package::{Instruction, InstructionAction, OrderPackage, PackageLimits, PackageType};
pub use trade::{OrderRef, Trade, TradeBook};
