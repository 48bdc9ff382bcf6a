//! Core types shared by every layer
//!
//! - identifier newtypes (`OrderId`, `TradeId`, `BetId`, `PackageId`, ...)
//! - `Side` and `SelectionKey`
//! - 2dp money helpers
//! - order / trade lifecycle state machines
//! - the error taxonomy

pub mod errors;
pub mod order_fsm;
pub mod types;

pub use errors::{InstructionErrorCode, PaddockError, PaddockResult};
pub use order_fsm::{OrderStatus, StatusChange, TradeStatus};
pub use types::{
    money, BetId, ClientId, IdSequence, MarketId, OrderId, PackageId, SelectionKey, Side,
    StrategyId, StreamId, TradeId,
};
