//! Market snapshot model
//!
//! A `MarketBook` is one point-in-time view of a market as delivered by a
//! feed (live or recorded). Snapshots are read-only to the core; they are
//! decoded by an outside collaborator and handed in already parsed.

use crate::core::{MarketId, SelectionKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A price level: price and the size available (or traded) at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceSize {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceSize {
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

impl From<(Decimal, Decimal)> for PriceSize {
    fn from((price, size): (Decimal, Decimal)) -> Self {
        Self { price, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    Inactive,
    #[default]
    Open,
    Suspended,
    Closed,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Inactive => write!(f, "INACTIVE"),
            MarketStatus::Open => write!(f, "OPEN"),
            MarketStatus::Suspended => write!(f, "SUSPENDED"),
            MarketStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerStatus {
    #[default]
    Active,
    Removed,
    Winner,
    Loser,
    /// Finished in the places of an each-way or place market
    Placed,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerStatus::Active => write!(f, "ACTIVE"),
            RunnerStatus::Removed => write!(f, "REMOVED"),
            RunnerStatus::Winner => write!(f, "WINNER"),
            RunnerStatus::Loser => write!(f, "LOSER"),
            RunnerStatus::Placed => write!(f, "PLACED"),
        }
    }
}

/// Exchange ladders of one runner, each sorted best-first
///
/// `available_to_back` is sorted by descending price, `available_to_lay`
/// by ascending price. `traded_volume` is cumulative per price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExchangePrices {
    #[serde(default)]
    pub available_to_back: Vec<PriceSize>,
    #[serde(default)]
    pub available_to_lay: Vec<PriceSize>,
    #[serde(default)]
    pub traded_volume: Vec<PriceSize>,
}

/// Starting-price fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StartingPrices {
    #[serde(default)]
    pub near_price: Option<Decimal>,
    #[serde(default)]
    pub far_price: Option<Decimal>,
    /// Reconciled starting price, present once the market has reconciled
    #[serde(default)]
    pub actual_sp: Option<Decimal>,
    #[serde(default)]
    pub back_stake_taken: Vec<PriceSize>,
    #[serde(default)]
    pub lay_liability_taken: Vec<PriceSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerBook {
    pub selection_id: u64,
    #[serde(default)]
    pub handicap: Decimal,
    #[serde(default)]
    pub status: RunnerStatus,
    /// Percentage reduction applied to other runners' matched prices if
    /// this runner is removed
    #[serde(default)]
    pub adjustment_factor: Option<Decimal>,
    #[serde(default)]
    pub last_price_traded: Option<Decimal>,
    #[serde(default)]
    pub total_matched: Decimal,
    #[serde(default)]
    pub ex: ExchangePrices,
    #[serde(default)]
    pub sp: StartingPrices,
}

impl RunnerBook {
    pub fn key(&self) -> SelectionKey {
        SelectionKey::new(self.selection_id, self.handicap)
    }

    pub fn best_back(&self) -> Option<&PriceSize> {
        self.ex.available_to_back.first()
    }

    pub fn best_lay(&self) -> Option<&PriceSize> {
        self.ex.available_to_lay.first()
    }
}

/// One snapshot of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBook {
    pub market_id: MarketId,
    /// Publish time of the snapshot in epoch milliseconds
    pub publish_time_ms: u64,
    /// Grouping key for markets that belong to the same event
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub status: MarketStatus,
    #[serde(default)]
    pub inplay: bool,
    /// Bumped by the exchange on every material market change
    #[serde(default)]
    pub version: u64,
    /// Bet delay in seconds, non-zero in-play
    #[serde(default)]
    pub bet_delay: u32,
    #[serde(default)]
    pub bsp_market: bool,
    #[serde(default)]
    pub bsp_reconciled: bool,
    #[serde(default)]
    pub persistence_enabled: bool,
    #[serde(default = "default_number_of_winners")]
    pub number_of_winners: u32,
    #[serde(default)]
    pub number_of_active_runners: u32,
    /// Commission rate in percent
    #[serde(default)]
    pub market_base_rate: Option<Decimal>,
    /// Present on each-way markets: place terms as a fraction of the odds
    #[serde(default)]
    pub each_way_divisor: Option<Decimal>,
    #[serde(default)]
    pub runners: Vec<RunnerBook>,
}

fn default_number_of_winners() -> u32 {
    1
}

impl MarketBook {
    pub fn runner(&self, key: &SelectionKey) -> Option<&RunnerBook> {
        self.runners
            .iter()
            .find(|r| r.selection_id == key.selection_id && r.handicap == key.handicap)
    }

    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == MarketStatus::Closed
    }

    pub fn active_runners(&self) -> impl Iterator<Item = &RunnerBook> {
        self.runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Active)
    }

    /// Number of runners settled as winners
    pub fn winner_count(&self) -> u32 {
        self.runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Winner)
            .count() as u32
    }

    /// Dead-heat divisor for winning bets
    ///
    /// When more runners win than the market has winning places, the
    /// runners tied for the last place split the payout evenly. Snapshots
    /// carry no finishing positions, so in place markets the divisor is
    /// applied to every winner, including those placed clear of the tie.
    pub fn dead_heat_divisor(&self) -> u32 {
        let winners = self.winner_count();
        let places = self.number_of_winners.max(1);
        if winners > places {
            winners - places + 1
        } else {
            1
        }
    }
}
