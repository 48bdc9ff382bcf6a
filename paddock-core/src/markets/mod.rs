//! Markets under management
//!
//! - `Market`: the latest snapshot plus every trade and order in it
//! - `Blotter`: id and secondary indexes over a market's orders
//! - `Markets`: all open markets, keyed by id, grouped by event

pub mod blotter;
pub mod market;

pub use blotter::Blotter;
pub use market::{Market, MarketParts};

use crate::core::{MarketId, PaddockError, PaddockResult};
use crate::data::MarketBook;
use std::collections::BTreeMap;
use tracing::debug;

/// Every market seen and not yet evicted
///
/// Ordered by id so iteration is reproducible between runs.
#[derive(Debug, Default)]
pub struct Markets {
    markets: BTreeMap<MarketId, Market>,
}

impl Markets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot, creating the market on first sight
    ///
    /// Returns true when the market is new.
    pub fn apply(&mut self, book: MarketBook) -> bool {
        match self.markets.get_mut(&book.market_id) {
            Some(market) => {
                market.update_book(book);
                false
            }
            None => {
                debug!(market_id = %book.market_id, "new market");
                self.markets.insert(book.market_id.clone(), Market::new(book));
                true
            }
        }
    }

    pub fn get(&self, market_id: &MarketId) -> Option<&Market> {
        self.markets.get(market_id)
    }

    pub fn get_mut(&mut self, market_id: &MarketId) -> Option<&mut Market> {
        self.markets.get_mut(market_id)
    }

    pub fn try_get_mut(&mut self, market_id: &MarketId) -> PaddockResult<&mut Market> {
        self.markets
            .get_mut(market_id)
            .ok_or_else(|| PaddockError::UnknownMarket(market_id.clone()))
    }

    pub fn remove(&mut self, market_id: &MarketId) -> Option<Market> {
        self.markets.remove(market_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Market> {
        self.markets.values_mut()
    }

    /// Markets belonging to one event
    pub fn event_markets<'a>(&'a self, event_id: &'a str) -> impl Iterator<Item = &'a Market> + 'a {
        self.markets
            .values()
            .filter(move |m| m.event_id.as_deref() == Some(event_id))
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketBookBuilder;

    #[test]
    fn test_apply_creates_then_updates() {
        let mut markets = Markets::new();
        assert!(markets.apply(MarketBookBuilder::new("1.1").event("e1").version(1).build()));
        assert!(!markets.apply(MarketBookBuilder::new("1.1").event("e1").version(2).build()));
        assert_eq!(markets.len(), 1);
        assert_eq!(markets.get(&MarketId::new("1.1")).unwrap().book().version, 2);
    }

    #[test]
    fn test_event_grouping() {
        let mut markets = Markets::new();
        markets.apply(MarketBookBuilder::new("1.1").event("e1").build());
        markets.apply(MarketBookBuilder::new("1.2").event("e1").build());
        markets.apply(MarketBookBuilder::new("1.3").event("e2").build());
        assert_eq!(markets.event_markets("e1").count(), 2);
        assert!(markets.try_get_mut(&MarketId::new("9.9")).is_err());
    }
}
