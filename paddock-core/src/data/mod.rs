//! Market data model
//!
//! - `types`: `MarketBook` / `RunnerBook` snapshots as delivered by a feed
//! - `ladder`: best-first ladder lookups and exchange tick tables
//! - `snapshot_builder`: fluent construction of snapshots
//! - `validator`: structural and ordering checks applied before matching

pub mod ladder;
pub mod snapshot_builder;
pub mod types;
pub mod validator;

pub use ladder::PriceLadderKind;
pub use snapshot_builder::{MarketBookBuilder, RunnerBuilder};
pub use types::{
    ExchangePrices, MarketBook, MarketStatus, PriceSize, RunnerBook, RunnerStatus,
    StartingPrices,
};
pub use validator::{SnapshotValidator, ValidationError};
