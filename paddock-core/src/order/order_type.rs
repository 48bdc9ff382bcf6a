//! Order-type variants
//!
//! A closed sum type: every consumer matches exhaustively on it, so adding a
//! variant is a compile error everywhere it needs handling.

use crate::data::PriceLadderKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to unmatched size when the market turns in-play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceType {
    /// Lapse the unmatched remainder on suspension
    #[default]
    Lapse,
    /// Keep working in-play
    Persist,
    /// Convert the unmatched remainder to a starting-price bet
    MarketOnClose,
}

impl fmt::Display for PersistenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceType::Lapse => write!(f, "LAPSE"),
            PersistenceType::Persist => write!(f, "PERSIST"),
            PersistenceType::MarketOnClose => write!(f, "MARKET_ON_CLOSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Match what is available now (subject to the minimum fill size) and
    /// lapse the rest
    FillOrKill,
}

/// Limit order parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default)]
    pub persistence_type: PersistenceType,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    /// Minimum matched size for fill-or-kill, defaults to the full size
    #[serde(default)]
    pub min_fill_size: Option<Decimal>,
    #[serde(default)]
    pub price_ladder: PriceLadderKind,
}

impl LimitOrder {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self {
            price,
            size,
            persistence_type: PersistenceType::Lapse,
            time_in_force: None,
            min_fill_size: None,
            price_ladder: PriceLadderKind::Classic,
        }
    }

    pub fn persistence(mut self, persistence_type: PersistenceType) -> Self {
        self.persistence_type = persistence_type;
        self
    }

    pub fn fill_or_kill(mut self, min_fill_size: Option<Decimal>) -> Self {
        self.time_in_force = Some(TimeInForce::FillOrKill);
        self.min_fill_size = min_fill_size;
        self
    }

    pub fn ladder(mut self, price_ladder: PriceLadderKind) -> Self {
        self.price_ladder = price_ladder;
        self
    }

    pub fn is_fill_or_kill(&self) -> bool {
        self.time_in_force == Some(TimeInForce::FillOrKill)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit(LimitOrder),
    /// Starting-price bet with a price limit
    LimitOnClose { price: Decimal, liability: Decimal },
    /// Starting-price bet at any price
    MarketOnClose { liability: Decimal },
}

impl OrderType {
    pub fn limit(price: Decimal, size: Decimal) -> Self {
        OrderType::Limit(LimitOrder::new(price, size))
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderType::Limit(_) => "LIMIT",
            OrderType::LimitOnClose { .. } => "LIMIT_ON_CLOSE",
            OrderType::MarketOnClose { .. } => "MARKET_ON_CLOSE",
        }
    }

    pub fn as_limit(&self) -> Option<&LimitOrder> {
        match self {
            OrderType::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    pub fn as_limit_mut(&mut self) -> Option<&mut LimitOrder> {
        match self {
            OrderType::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, OrderType::Limit(_))
    }

    pub fn price(&self) -> Option<Decimal> {
        match self {
            OrderType::Limit(limit) => Some(limit.price),
            OrderType::LimitOnClose { price, .. } => Some(*price),
            OrderType::MarketOnClose { .. } => None,
        }
    }

    pub fn liability(&self) -> Option<Decimal> {
        match self {
            OrderType::Limit(_) => None,
            OrderType::LimitOnClose { liability, .. } | OrderType::MarketOnClose { liability } => {
                Some(*liability)
            }
        }
    }

    /// Orders settled (wholly or partly) at the starting price
    pub fn takes_starting_price(&self) -> bool {
        match self {
            OrderType::Limit(limit) => limit.persistence_type == PersistenceType::MarketOnClose,
            OrderType::LimitOnClose { .. } | OrderType::MarketOnClose { .. } => true,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit(limit) => write!(
                f,
                "LIMIT {}@{} {}",
                limit.size, limit.price, limit.persistence_type
            ),
            OrderType::LimitOnClose { price, liability } => {
                write!(f, "LIMIT_ON_CLOSE {} liability@{}", liability, price)
            }
            OrderType::MarketOnClose { liability } => {
                write!(f, "MARKET_ON_CLOSE {} liability", liability)
            }
        }
    }
}
