//! Event loops
//!
//! - `backtest`: deterministic replay of recorded feeds on a virtual clock
//! - `live`: the same dispatch against a real exchange through the worker pool
//!
//! Both share the strategy interface, settlement and cleared-order logging.

pub mod backtest;
pub mod clock;
pub mod live;
pub mod settlement;
pub mod strategy;
pub mod stream;

pub use backtest::{BacktestEngine, BacktestReport, EngineState};
pub use clock::{wall_clock_ms, VirtualClock};
pub use live::{LiveEngine, LiveReport, MarketStream, ReplayStream};
pub use settlement::{clear_market, commission, ClearedLogger, ClearedMarket, ClearedOrder, TracingLogger};
pub use strategy::{Strategy, StrategyContext};
pub use stream::{replay_order, HistoricalFeed, UpdateRef};
