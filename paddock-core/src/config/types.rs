use super::constants::*;
use crate::core::ClientId;
use crate::order::PackageLimits;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
///
/// Every section is optional in the JSON file; omitted fields take the
/// defaults from `constants`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub strategy_limits: StrategyLimits,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated exchange behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_place_latency")]
    pub place_latency_ms: u64,
    #[serde(default = "default_cancel_latency")]
    pub cancel_latency_ms: u64,
    #[serde(default = "default_update_latency")]
    pub update_latency_ms: u64,
    #[serde(default = "default_replace_latency")]
    pub replace_latency_ms: u64,
    /// Add the market's in-play bet delay to place/replace packages
    #[serde(default = "default_true")]
    pub apply_bet_delay: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            place_latency_ms: PLACE_LATENCY_MS,
            cancel_latency_ms: CANCEL_LATENCY_MS,
            update_latency_ms: UPDATE_LATENCY_MS,
            replace_latency_ms: REPLACE_LATENCY_MS,
            apply_bet_delay: true,
        }
    }
}

impl SimulationConfig {
    /// No network delay at all; packages execute on the next snapshot
    pub fn instant() -> Self {
        Self {
            place_latency_ms: 0,
            cancel_latency_ms: 0,
            update_latency_ms: 0,
            replace_latency_ms: 0,
            apply_bet_delay: false,
        }
    }
}

/// Exchange account settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_id")]
    pub client_id: ClientId,
    #[serde(default = "default_min_bet_size")]
    pub min_bet_size: Decimal,
    #[serde(default = "default_min_bet_payout")]
    pub min_bet_payout: Decimal,
    #[serde(default = "default_min_bsp_liability")]
    pub min_bsp_liability: Decimal,
    /// Apply the minimum-stake checks in order validation
    #[serde(default = "default_true")]
    pub min_bet_validation: bool,
    #[serde(default = "default_max_transactions")]
    pub max_transactions_per_hour: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            min_bet_size: MIN_BET_SIZE,
            min_bet_payout: MIN_BET_PAYOUT,
            min_bsp_liability: MIN_BSP_LIABILITY,
            min_bet_validation: true,
            max_transactions_per_hour: MAX_TRANSACTIONS_PER_HOUR,
        }
    }
}

/// Transaction batching behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Abort every pending operation when any control fails
    #[serde(default)]
    pub atomic: bool,
    #[serde(default)]
    pub package_limits: PackageLimits,
}

/// Exposure ceilings applied to each strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyLimits {
    #[serde(default = "default_max_order_exposure")]
    pub max_order_exposure: Decimal,
    #[serde(default = "default_max_selection_exposure")]
    pub max_selection_exposure: Decimal,
}

impl Default for StrategyLimits {
    fn default() -> Self {
        Self {
            max_order_exposure: MAX_ORDER_EXPOSURE,
            max_selection_exposure: MAX_SELECTION_EXPOSURE,
        }
    }
}

/// Live execution worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_step")]
    pub retry_step_ms: u64,
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            workers: EXECUTION_WORKERS,
            queue_capacity: EXECUTION_QUEUE_CAPACITY,
            max_attempts: EXECUTION_MAX_ATTEMPTS,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            retry_step_ms: RETRY_STEP_MS,
            jitter_factor: 0.0,
        }
    }
}

impl LiveConfig {
    pub fn backoff(&self) -> crate::execution::BackoffConfig {
        crate::execution::BackoffConfig {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            step: Duration::from_millis(self.retry_step_ms),
            max_attempts: self.max_attempts,
            jitter_factor: self.jitter_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_place_latency() -> u64 {
    PLACE_LATENCY_MS
}

fn default_cancel_latency() -> u64 {
    CANCEL_LATENCY_MS
}

fn default_update_latency() -> u64 {
    UPDATE_LATENCY_MS
}

fn default_replace_latency() -> u64 {
    REPLACE_LATENCY_MS
}

fn default_client_id() -> ClientId {
    ClientId::new("simulated")
}

fn default_min_bet_size() -> Decimal {
    MIN_BET_SIZE
}

fn default_min_bet_payout() -> Decimal {
    MIN_BET_PAYOUT
}

fn default_min_bsp_liability() -> Decimal {
    MIN_BSP_LIABILITY
}

fn default_max_transactions() -> u32 {
    MAX_TRANSACTIONS_PER_HOUR
}

fn default_max_order_exposure() -> Decimal {
    MAX_ORDER_EXPOSURE
}

fn default_max_selection_exposure() -> Decimal {
    MAX_SELECTION_EXPOSURE
}

fn default_workers() -> usize {
    EXECUTION_WORKERS
}

fn default_queue_capacity() -> usize {
    EXECUTION_QUEUE_CAPACITY
}

fn default_max_attempts() -> u32 {
    EXECUTION_MAX_ATTEMPTS
}

fn default_retry_base() -> u64 {
    RETRY_BASE_DELAY_MS
}

fn default_retry_step() -> u64 {
    RETRY_STEP_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
