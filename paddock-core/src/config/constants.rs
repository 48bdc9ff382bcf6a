//! Default values for configuration
//!
//! Runtime configuration (`Config`) falls back to these when a field is
//! omitted from the JSON file.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===== PACKAGE LIMITS =====

/// Maximum place instructions per package
pub const PLACE_PACKAGE_LIMIT: usize = 200;

/// Maximum cancel instructions per package
pub const CANCEL_PACKAGE_LIMIT: usize = 60;

/// Maximum update instructions per package
pub const UPDATE_PACKAGE_LIMIT: usize = 60;

/// Maximum replace instructions per package
pub const REPLACE_PACKAGE_LIMIT: usize = 60;

// ===== SIMULATED LATENCY =====

/// Network + processing delay before a simulated place reaches the exchange
pub const PLACE_LATENCY_MS: u64 = 120;

/// Simulated cancel delay
pub const CANCEL_LATENCY_MS: u64 = 170;

/// Simulated update delay
pub const UPDATE_LATENCY_MS: u64 = 150;

/// Simulated replace delay (cancel + place round trip)
pub const REPLACE_LATENCY_MS: u64 = 280;

// ===== CLIENT MINIMUMS (GBP) =====

/// Minimum stake of a limit order
pub const MIN_BET_SIZE: Decimal = dec!(1.00);

/// Stakes under the minimum are accepted when the payout reaches this
pub const MIN_BET_PAYOUT: Decimal = dec!(10.00);

/// Minimum liability of a starting-price bet
pub const MIN_BSP_LIABILITY: Decimal = dec!(10.00);

// ===== TRANSACTION LIMITS =====

/// Transactions allowed per client per rolling hour
pub const MAX_TRANSACTIONS_PER_HOUR: u32 = 5_000;

/// Length of the transaction-count window
pub const TRANSACTION_WINDOW_MS: u64 = 60 * 60 * 1_000;

// ===== STRATEGY EXPOSURE =====

/// Default per-order exposure ceiling
pub const MAX_ORDER_EXPOSURE: Decimal = dec!(100);

/// Default per-selection exposure ceiling
pub const MAX_SELECTION_EXPOSURE: Decimal = dec!(200);

// ===== LIVE EXECUTION =====

/// Worker threads in the execution pool
pub const EXECUTION_WORKERS: usize = 4;

/// Bounded queue depth between dispatcher and workers
pub const EXECUTION_QUEUE_CAPACITY: usize = 1_024;

/// Attempts per package before giving up
pub const EXECUTION_MAX_ATTEMPTS: u32 = 3;

/// Base delay for the linear retry back-off
pub const RETRY_BASE_DELAY_MS: u64 = 100;

/// Increment added per further retry
pub const RETRY_STEP_MS: u64 = 100;

// ===== LOGGING =====

/// Environment variable overriding the configured log level
pub const LOG_LEVEL_ENV: &str = "PADDOCK_LOG";

pub const DEFAULT_LOG_LEVEL: &str = "info";
