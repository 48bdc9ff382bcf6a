//! Shared pieces of the paddock binaries

pub mod common;
pub mod strategies;
