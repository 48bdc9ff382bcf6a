//! Fixtures shared by unit tests, integration tests and benches
//!
//! - snapshot builders for common market shapes
//! - a scripted strategy that places a fixed list of orders
//! - a cleared-order logger that keeps what it was given

pub mod helpers;

pub use helpers::*;
