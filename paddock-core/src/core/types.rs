//! Identifier newtypes, sides and money helpers shared by every layer
//!
//! Ids are plain counters rather than random values so that a replayed
//! backtest hands out exactly the same ids every run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[inline(always)]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

counter_id!(
    /// Locally generated order identifier, unique within a market
    OrderId,
    "O"
);
counter_id!(
    /// Identifier of a trade (a strategy intent on one selection)
    TradeId,
    "T"
);
counter_id!(
    /// Exchange-assigned bet identifier, set once an order is accepted
    BetId,
    "B"
);
counter_id!(
    /// Identifier of an order package handed to an execution sink
    PackageId,
    "P"
);

/// Monotonic id source
///
/// Owned by whoever scopes the ids (a market for orders and trades, the
/// engine for bet and package ids). Never shared between threads.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start handing out ids from `first`
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    #[inline]
    pub fn next_value(&mut self) -> u64 {
        let value = self.next.max(1);
        self.next = value + 1;
        value
    }

    pub fn next_order(&mut self) -> OrderId {
        OrderId(self.next_value())
    }

    pub fn next_trade(&mut self) -> TradeId {
        TradeId(self.next_value())
    }

    pub fn next_bet(&mut self) -> BetId {
        BetId(self.next_value())
    }

    pub fn next_package(&mut self) -> PackageId {
        PackageId(self.next_value())
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Exchange market id, e.g. `1.234567890`
    MarketId
);
string_id!(
    /// Name of the strategy that owns a trade
    StrategyId
);
string_id!(
    /// Exchange account / client the orders are placed through
    ClientId
);
string_id!(
    /// Identifier of a recorded or live market stream
    StreamId
);

/// A runner in a market: selection id plus handicap (zero outside
/// handicap markets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionKey {
    pub selection_id: u64,
    #[serde(default)]
    pub handicap: Decimal,
}

impl SelectionKey {
    pub const fn new(selection_id: u64, handicap: Decimal) -> Self {
        Self {
            selection_id,
            handicap,
        }
    }

    pub fn selection(selection_id: u64) -> Self {
        Self::new(selection_id, Decimal::ZERO)
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.handicap.is_zero() {
            write!(f, "{}", self.selection_id)
        } else {
            write!(f, "{}@{}", self.selection_id, self.handicap)
        }
    }
}

/// Back (bet for an outcome) or lay (bet against it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Back,
    Lay,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Back => Side::Lay,
            Side::Lay => Side::Back,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Back => write!(f, "BACK"),
            Side::Lay => write!(f, "LAY"),
        }
    }
}

/// Money arithmetic
///
/// Every monetary value (price, size, liability, profit) is rounded to two
/// decimal places at the point it is computed, using banker's rounding.
pub mod money {
    use rust_decimal::{Decimal, RoundingStrategy};

    /// Round to 2dp, half-to-even
    #[inline]
    pub fn round2(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
    }

    /// True when the value carries no more than two decimal places
    #[inline]
    pub fn has_at_most_2dp(value: Decimal) -> bool {
        value.normalize().scale() <= 2
    }

    /// Volume-weighted average price of `(price, size)` fills, rounded
    pub fn wap(fills: impl IntoIterator<Item = (Decimal, Decimal)>) -> Option<Decimal> {
        let (mut notional, mut total) = (Decimal::ZERO, Decimal::ZERO);
        for (price, size) in fills {
            notional += price * size;
            total += size;
        }
        if total.is_zero() {
            None
        } else {
            Some(round2(notional / total))
        }
    }
}
