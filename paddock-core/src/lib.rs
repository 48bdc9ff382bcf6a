//! Paddock Core - simulated betting exchange and strategy runtime
//!
//! Paddock replays recorded exchange market data through a simulated
//! matching engine so that betting strategies can be backtested with the
//! same order lifecycle they would see live: latency, in-play bet delay,
//! queue position, partial fills, settlement and commission.
//!
//! ## Architecture
//! - **Deterministic**: one thread, virtual clock driven by the data,
//!   counter-based ids; two runs over the same feeds agree exactly
//! - **Decimal money**: prices and stakes are `rust_decimal::Decimal`,
//!   rounded to pennies at the ledger boundary
//! - **Two loops, one model**: the backtest and live engines share
//!   markets, controls, transactions and settlement
//!
//! ## Core Modules
//! - `core`: ids, sides, order/trade state machines, errors
//! - `data`: market snapshots, price ladders, validation
//! - `order`: orders, trades and the packages that carry instructions
//! - `markets`: per-market state and the order blotter
//! - `exposure`: worst-case profit and loss per selection and market
//! - `controls`: pre-trade checks run inside a transaction
//! - `transaction`: batching of order operations into packages
//! - `simulation`: matching engine, runner analytics, settlement profit
//! - `execution`: simulated exchange, live worker pool, reconciliation
//! - `engine`: backtest and live event loops, strategies, cleared orders

pub mod config;
pub mod controls;
pub mod core;
pub mod data;
pub mod engine;
pub mod execution;
pub mod exposure;
pub mod markets;
pub mod order;
pub mod simulation;
pub mod transaction;
pub mod utils;

pub mod testing;

pub use crate::core::{
    BetId, ClientId, MarketId, OrderId, OrderStatus, PackageId, PaddockError, PaddockResult,
    SelectionKey, Side, StrategyId, StreamId, TradeId,
};
pub use config::Config;
pub use data::{MarketBook, MarketBookBuilder};
pub use engine::{BacktestEngine, BacktestReport, HistoricalFeed, LiveEngine, Strategy, StrategyContext};
pub use order::{OrderType, PersistenceType};
pub use transaction::{Transaction, TradingEnv};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    // Ids and sides
    pub use crate::core::{MarketId, OrderId, OrderStatus, SelectionKey, Side, StrategyId, StreamId, TradeId};

    // Engine
    pub use crate::engine::{
        BacktestEngine, BacktestReport, ClearedMarket, ClearedOrder, HistoricalFeed, Strategy,
        StrategyContext,
    };

    // Market data and orders
    pub use crate::data::{MarketBook, MarketStatus, RunnerStatus};
    pub use crate::order::{LimitOrder, OrderType, PersistenceType};

    pub use crate::config::Config;

    // Error types
    pub use crate::{Error, Result};
}
