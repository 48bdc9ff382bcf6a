//! Time sources
//!
//! Backtests run on a virtual clock driven by snapshot publish times; the
//! live engine reads the wall clock. Both are plain millisecond values
//! passed down to every layer that needs "now".

use std::time::{SystemTime, UNIX_EPOCH};

/// Clock advanced by the replayed data
///
/// Monotonic between resets; the backtest resets it at the start of each
/// replay group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClock {
    now_ms: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Move to `publish_time_ms`; never moves backwards
    #[inline]
    pub fn advance_to(&mut self, publish_time_ms: u64) -> u64 {
        self.now_ms = self.now_ms.max(publish_time_ms);
        self.now_ms
    }

    pub fn reset(&mut self) {
        self.now_ms = 0;
    }
}

/// Milliseconds since the Unix epoch
pub fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
