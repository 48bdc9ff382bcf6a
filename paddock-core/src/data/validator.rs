//! Snapshot sanity checks
//!
//! A single validation point for every snapshot before it reaches the
//! matching engine. Invalid snapshots are skipped by the event loop.

use super::ladder::{MAX_PRICE, MIN_PRICE};
use super::types::{MarketBook, PriceSize};
use crate::core::MarketId;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("publish time went backwards: {previous_ms} -> {current_ms}")]
    OutOfOrder { previous_ms: u64, current_ms: u64 },

    #[error("runner {selection_id}: {ladder} ladder is not sorted best-first")]
    UnsortedLadder {
        selection_id: u64,
        ladder: &'static str,
    },

    #[error("runner {selection_id}: negative size {size} at {price}")]
    NegativeSize {
        selection_id: u64,
        price: Decimal,
        size: Decimal,
    },

    #[error("runner {selection_id}: price {price} outside the exchange range")]
    PriceOutOfRange { selection_id: u64, price: Decimal },

    #[error("runner {selection_id} appears twice")]
    DuplicateRunner { selection_id: u64 },
}

/// Per-market validator that also tracks publish-time ordering
#[derive(Debug, Default)]
pub struct SnapshotValidator {
    last_publish: HashMap<MarketId, u64>,
}

impl SnapshotValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and, if valid, remember the snapshot's publish time
    pub fn validate(&mut self, book: &MarketBook) -> Result<(), ValidationError> {
        if let Some(&previous_ms) = self.last_publish.get(&book.market_id) {
            if book.publish_time_ms < previous_ms {
                return Err(ValidationError::OutOfOrder {
                    previous_ms,
                    current_ms: book.publish_time_ms,
                });
            }
        }
        validate_book(book)?;
        self.last_publish
            .insert(book.market_id.clone(), book.publish_time_ms);
        Ok(())
    }

    /// Forget a market (after it closed)
    pub fn forget(&mut self, market_id: &MarketId) {
        self.last_publish.remove(market_id);
    }

    pub fn reset(&mut self) {
        self.last_publish.clear();
    }
}

/// Stateless structural checks on one snapshot
pub fn validate_book(book: &MarketBook) -> Result<(), ValidationError> {
    let mut seen = Vec::with_capacity(book.runners.len());
    for runner in &book.runners {
        let key = runner.key();
        if seen.contains(&key) {
            return Err(ValidationError::DuplicateRunner {
                selection_id: runner.selection_id,
            });
        }
        seen.push(key);

        let id = runner.selection_id;
        check_levels(id, &runner.ex.available_to_back)?;
        check_levels(id, &runner.ex.available_to_lay)?;
        check_levels(id, &runner.ex.traded_volume)?;

        if !is_sorted_by(&runner.ex.available_to_back, |a, b| a > b) {
            return Err(ValidationError::UnsortedLadder {
                selection_id: id,
                ladder: "available_to_back",
            });
        }
        if !is_sorted_by(&runner.ex.available_to_lay, |a, b| a < b) {
            return Err(ValidationError::UnsortedLadder {
                selection_id: id,
                ladder: "available_to_lay",
            });
        }
    }
    Ok(())
}

fn check_levels(selection_id: u64, ladder: &[PriceSize]) -> Result<(), ValidationError> {
    for level in ladder {
        if level.size.is_sign_negative() && !level.size.is_zero() {
            return Err(ValidationError::NegativeSize {
                selection_id,
                price: level.price,
                size: level.size,
            });
        }
        if level.price < MIN_PRICE || level.price > MAX_PRICE {
            return Err(ValidationError::PriceOutOfRange {
                selection_id,
                price: level.price,
            });
        }
    }
    Ok(())
}

fn is_sorted_by(ladder: &[PriceSize], better: impl Fn(&Decimal, &Decimal) -> bool) -> bool {
    ladder.windows(2).all(|w| better(&w[0].price, &w[1].price))
}
