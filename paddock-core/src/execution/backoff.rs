//! Linear back-off for package retries
//!
//! Delay for attempt `n` (0-based) is `base_delay + n * step`, optionally
//! spread by a random jitter so workers retrying together do not fire in
//! lockstep. The attempt ceiling is hard: once reached, `next_delay`
//! returns `None` and the package is given up.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub step: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Random spread applied to each delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        use crate::config::constants::{EXECUTION_MAX_ATTEMPTS, RETRY_BASE_DELAY_MS, RETRY_STEP_MS};
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            step: Duration::from_millis(RETRY_STEP_MS),
            max_attempts: EXECUTION_MAX_ATTEMPTS,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffConfig {
    /// No waiting between attempts (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            step: Duration::ZERO,
            max_attempts,
            jitter_factor: 0.0,
        }
    }
}

/// Retry state for one package
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    config: BackoffConfig,
    attempts: u32,
}

impl LinearBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next
    ///
    /// `None` once the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        let delay = self.config.base_delay + self.config.step * (self.attempts - 1);
        Some(self.with_jitter(delay))
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen::<f64>() * self.config.jitter_factor;
        let multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);
        Duration::from_secs_f64(delay.as_secs_f64() * multiplier.max(0.0))
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.config.max_attempts
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(100),
            step: Duration::from_millis(50),
            max_attempts,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_linear_growth() {
        let mut backoff = LinearBackoff::new(config(5));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(150)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_hard_ceiling() {
        let mut backoff = LinearBackoff::new(config(3));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        // third failure is the last attempt
        assert!(backoff.next_delay().is_none());
        assert!(!backoff.can_retry());
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut backoff = LinearBackoff::new(config(1));
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let mut backoff = LinearBackoff::new(BackoffConfig {
            jitter_factor: 0.2,
            ..config(10)
        });
        let delay = backoff.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(90));
        assert!(delay <= Duration::from_millis(110));
    }
}
