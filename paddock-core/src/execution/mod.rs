//! Order execution
//!
//! Transactions hand finished packages to a `PackageSink`. Two sinks exist:
//!
//! - `SimulatedQueue` (backtest): holds packages for their simulated latency;
//!   the backtest loop then runs them through `SimulatedExchange`.
//! - `WorkerPool` (live): sends packages to an `ExchangeClient` on worker
//!   threads and returns `ExecutionEvent`s through a channel.
//!
//! Either way the responses are applied to orders by `reconcile`.

pub mod backoff;
pub mod reconcile;
pub mod simulated;
pub mod types;
pub mod worker_pool;

pub use backoff::{BackoffConfig, LinearBackoff};
pub use reconcile::{apply_execution_event, resolve_instruction};
pub use simulated::{DelayedPackage, SimulatedExchange, SimulatedQueue};
pub use types::{ExecutionEvent, ExecutionOutcome, InstructionReport, InstructionStatus};
pub use worker_pool::{ExchangeClient, PoolStats, WorkerPool};

use crate::order::OrderPackage;

/// Receives each order package exactly once
pub trait PackageSink {
    fn submit(&mut self, package: OrderPackage);
}

/// Keeps every package it is given; for tests and dry runs
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub packages: Vec<OrderPackage>,
}

impl PackageSink for CollectingSink {
    fn submit(&mut self, package: OrderPackage) {
        self.packages.push(package);
    }
}
