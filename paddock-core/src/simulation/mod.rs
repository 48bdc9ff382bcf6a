//! Simulated exchange
//!
//! - `matching`: placement, queue position and starting-price rules
//! - `analytics`: traded-volume deltas per runner
//! - `middleware`: per-snapshot analytics, removals and order advancement
//! - `profit`: settlement profit of an order

pub mod analytics;
pub mod matching;
pub mod middleware;
pub mod profit;

pub use analytics::RunnerAnalytics;
pub use matching::MatchingEngine;
pub use middleware::SimulationMiddleware;
pub use profit::order_profit;
