//! Price-ladder helpers
//!
//! Lookups on a best-first ladder plus the exchange's tick tables used to
//! validate order prices.

use super::types::PriceSize;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Lowest and highest prices the exchange accepts
pub const MIN_PRICE: Decimal = dec!(1.01);
pub const MAX_PRICE: Decimal = dec!(1000);

/// Classic odds ladder: (band upper bound, tick increment)
///
/// A price `p` in `(previous bound, bound]` must be a multiple of the
/// increment.
const CLASSIC_BANDS: [(Decimal, Decimal); 10] = [
    (dec!(2), dec!(0.01)),
    (dec!(3), dec!(0.02)),
    (dec!(4), dec!(0.05)),
    (dec!(6), dec!(0.1)),
    (dec!(10), dec!(0.2)),
    (dec!(20), dec!(0.5)),
    (dec!(30), dec!(1)),
    (dec!(50), dec!(2)),
    (dec!(100), dec!(5)),
    (dec!(1000), dec!(10)),
];

/// Price-ladder definition carried by a limit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceLadderKind {
    #[default]
    Classic,
    /// Every 0.01 between the min and max price
    Finest,
    /// Line markets: any 2dp value is accepted
    LineRange,
}

impl PriceLadderKind {
    pub fn is_valid_price(&self, price: Decimal) -> bool {
        match self {
            PriceLadderKind::Classic => is_classic_tick(price),
            PriceLadderKind::Finest => {
                (MIN_PRICE..=MAX_PRICE).contains(&price) && (price * dec!(100)).fract().is_zero()
            }
            PriceLadderKind::LineRange => (price * dec!(100)).fract().is_zero(),
        }
    }
}

fn is_classic_tick(price: Decimal) -> bool {
    if price < MIN_PRICE || price > MAX_PRICE {
        return false;
    }
    let mut lower = Decimal::ONE;
    for (upper, tick) in CLASSIC_BANDS {
        if price <= upper {
            return ((price - lower) % tick).is_zero();
        }
        lower = upper;
    }
    false
}

/// Price `n` ticks away on the classic ladder, `None` off the ends
pub fn ticks_away(price: Decimal, ticks: i32) -> Option<Decimal> {
    if !is_classic_tick(price) {
        return None;
    }
    let mut current = price;
    let step = ticks.signum();
    for _ in 0..ticks.unsigned_abs() {
        current = next_tick(current, step)?;
    }
    Some(current)
}

fn next_tick(price: Decimal, direction: i32) -> Option<Decimal> {
    let mut lower = Decimal::ONE;
    for (upper, tick) in CLASSIC_BANDS {
        if direction > 0 && price < upper {
            return Some(price + tick);
        }
        if direction < 0 && price <= upper {
            let candidate = price - tick;
            return (candidate >= MIN_PRICE).then_some(candidate.max(lower));
        }
        lower = upper;
    }
    None
}

/// Size at exactly `price`, `None` when the level is absent
pub fn size_at(ladder: &[PriceSize], price: Decimal) -> Option<Decimal> {
    ladder.iter().find(|level| level.price == price).map(|l| l.size)
}

/// Price at depth `level` (0 = best)
pub fn price_at(ladder: &[PriceSize], level: usize) -> Option<Decimal> {
    ladder.get(level).map(|l| l.price)
}

/// Total size across the ladder
pub fn total_size(ladder: &[PriceSize]) -> Decimal {
    ladder.iter().map(|l| l.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_ticks() {
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(1.01)));
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(2.02)));
        assert!(!PriceLadderKind::Classic.is_valid_price(dec!(2.01)));
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(3.05)));
        assert!(!PriceLadderKind::Classic.is_valid_price(dec!(3.02)));
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(6.2)));
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(15.5)));
        assert!(PriceLadderKind::Classic.is_valid_price(dec!(1000)));
        assert!(!PriceLadderKind::Classic.is_valid_price(dec!(1.00)));
        assert!(!PriceLadderKind::Classic.is_valid_price(dec!(1010)));
    }

    #[test]
    fn test_finest_and_line_ladders() {
        assert!(PriceLadderKind::Finest.is_valid_price(dec!(2.01)));
        assert!(!PriceLadderKind::Finest.is_valid_price(dec!(2.015)));
        assert!(PriceLadderKind::LineRange.is_valid_price(dec!(0.5)));
    }

    #[test]
    fn test_ticks_away() {
        assert_eq!(ticks_away(dec!(2.0), 1), Some(dec!(2.02)));
        assert_eq!(ticks_away(dec!(2.02), -1), Some(dec!(2.0)));
        assert_eq!(ticks_away(dec!(1.99), 1), Some(dec!(2.0)));
        assert_eq!(ticks_away(dec!(1.01), -1), None);
        assert_eq!(ticks_away(dec!(4.0), 2), Some(dec!(4.2)));
        assert_eq!(ticks_away(dec!(2.01), 1), None);
    }

    #[test]
    fn test_ladder_lookups() {
        let ladder = vec![
            PriceSize::new(dec!(2.0), dec!(20)),
            PriceSize::new(dec!(1.98), dec!(5)),
        ];
        assert_eq!(size_at(&ladder, dec!(1.98)), Some(dec!(5)));
        assert_eq!(size_at(&ladder, dec!(1.5)), None);
        assert_eq!(price_at(&ladder, 0), Some(dec!(2.0)));
        assert_eq!(price_at(&ladder, 2), None);
        assert_eq!(total_size(&ladder), dec!(25));
    }
}
