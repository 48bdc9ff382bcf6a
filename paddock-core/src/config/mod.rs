//! Runtime configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration. The log level can be overridden with the
//! `PADDOCK_LOG` environment variable.

pub mod constants;
pub mod types;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;

impl Config {
    /// Load configuration from a JSON file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        let text = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        let mut config = Self::from_json(&text)?;

        if let Ok(level) = std::env::var(constants::LOG_LEVEL_ENV) {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON text without validating it
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to deserialize configuration")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let client = &self.client;
        if client.min_bet_size <= Decimal::ZERO {
            anyhow::bail!("client.min_bet_size must be positive");
        }
        if client.min_bet_payout < Decimal::ZERO {
            anyhow::bail!("client.min_bet_payout cannot be negative");
        }
        if client.min_bsp_liability < Decimal::ZERO {
            anyhow::bail!("client.min_bsp_liability cannot be negative");
        }
        if client.max_transactions_per_hour == 0 {
            anyhow::bail!("client.max_transactions_per_hour must be at least 1");
        }

        let limits = &self.transaction.package_limits;
        if limits.place == 0 || limits.cancel == 0 || limits.update == 0 || limits.replace == 0 {
            anyhow::bail!("transaction.package_limits must all be at least 1");
        }

        if self.strategy_limits.max_order_exposure <= Decimal::ZERO {
            anyhow::bail!("strategy_limits.max_order_exposure must be positive");
        }
        if self.strategy_limits.max_selection_exposure < self.strategy_limits.max_order_exposure {
            anyhow::bail!("strategy_limits.max_selection_exposure cannot be below max_order_exposure");
        }

        if self.live.workers == 0 {
            anyhow::bail!("live.workers must be at least 1");
        }
        if self.live.queue_capacity == 0 {
            anyhow::bail!("live.queue_capacity must be at least 1");
        }
        if self.live.max_attempts == 0 {
            anyhow::bail!("live.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.live.jitter_factor) {
            anyhow::bail!("live.jitter_factor must be within 0.0..=1.0");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                valid_log_levels
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.simulation.place_latency_ms, 120);
        assert_eq!(config.client.min_bsp_liability, dec!(10.00));
        assert_eq!(config.transaction.package_limits.place, 200);
        assert!(!config.transaction.atomic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = Config::from_json(
            r#"{"simulation": {"place_latency_ms": 0}, "transaction": {"atomic": true}}"#,
        )
        .unwrap();
        assert_eq!(config.simulation.place_latency_ms, 0);
        assert_eq!(config.simulation.cancel_latency_ms, 170);
        assert!(config.transaction.atomic);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.client.min_bet_size = dec!(0);
        assert!(config.validate().is_err());
        config.client.min_bet_size = dec!(1);

        config.strategy_limits.max_selection_exposure = dec!(1);
        assert!(config.validate().is_err());
        config.strategy_limits = StrategyLimits::default();

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "debug".to_string();

        config.live.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"client": {{"client_id": "acct-1"}}}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.client.client_id.as_str(), "acct-1");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/paddock.json").is_err());
    }
}
