//! Settlement profit of a single order

use crate::core::{money, Side};
use crate::data::RunnerStatus;
use crate::order::Order;
use rust_decimal::Decimal;

/// Profit of a settled order, from the backer's point of view negated for
/// lays
///
/// Zero until the order carries a `Settlement`, and for removed runners.
pub fn order_profit(order: &Order) -> Decimal {
    let Some(settlement) = order.settlement else {
        return Decimal::ZERO;
    };
    let Some(price) = order.average_price_matched() else {
        return Decimal::ZERO;
    };
    let size = order.size_matched();
    let win = size * (price - Decimal::ONE);

    let back_profit = match (settlement.runner_status, settlement.each_way_divisor) {
        (RunnerStatus::Removed | RunnerStatus::Active, _) => return Decimal::ZERO,
        (RunnerStatus::Winner, Some(divisor)) => win + win / divisor,
        (RunnerStatus::Placed, Some(divisor)) => win / divisor - size,
        (RunnerStatus::Loser, Some(_)) => -size * Decimal::TWO,
        (RunnerStatus::Winner | RunnerStatus::Placed, None) => {
            let n = Decimal::from(settlement.dead_heat_divisor.max(1));
            (size / n) * (price - Decimal::ONE) - size * (n - Decimal::ONE) / n
        }
        (RunnerStatus::Loser, None) => -size,
    };

    let profit = match order.side {
        Side::Back => back_profit,
        Side::Lay => -back_profit,
    };
    money::round2(profit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClientId, MarketId, OrderId, SelectionKey, StrategyId, TradeId};
    use crate::order::{OrderType, Settlement};
    use rust_decimal_macros::dec;

    fn settled(side: Side, price: Decimal, size: Decimal, settlement: Settlement) -> Order {
        let mut order = Order::new(
            OrderId(1),
            TradeId(1),
            MarketId::new("1.1"),
            SelectionKey::selection(1),
            StrategyId::new("s"),
            ClientId::new("c"),
            side,
            OrderType::limit(price, size),
            0,
        );
        order.record_fill(0, price, size);
        order.settlement = Some(settlement);
        order
    }

    #[test]
    fn test_unsettled_is_zero() {
        let mut order = settled(Side::Back, dec!(2.0), dec!(10), Settlement::new(RunnerStatus::Winner));
        order.settlement = None;
        assert_eq!(order_profit(&order), dec!(0));
    }

    #[test]
    fn test_back_winner_and_loser() {
        let won = settled(Side::Back, dec!(2.0), dec!(10), Settlement::new(RunnerStatus::Winner));
        assert_eq!(order_profit(&won), dec!(10.00));
        let lost = settled(Side::Back, dec!(2.0), dec!(10), Settlement::new(RunnerStatus::Loser));
        assert_eq!(order_profit(&lost), dec!(-10.00));
    }

    #[test]
    fn test_lay_is_negated() {
        let won = settled(Side::Lay, dec!(3.0), dec!(10), Settlement::new(RunnerStatus::Winner));
        assert_eq!(order_profit(&won), dec!(-20.00));
        let lost = settled(Side::Lay, dec!(3.0), dec!(10), Settlement::new(RunnerStatus::Loser));
        assert_eq!(order_profit(&lost), dec!(10.00));
    }

    #[test]
    fn test_removed_runner_is_zero() {
        let order = settled(Side::Back, dec!(3.0), dec!(10), Settlement::new(RunnerStatus::Removed));
        assert_eq!(order_profit(&order), dec!(0));
    }

    #[test]
    fn test_each_way() {
        let terms = |status| Settlement {
            each_way_divisor: Some(dec!(4)),
            ..Settlement::new(status)
        };
        let placed = settled(Side::Back, dec!(6.0), dec!(10), terms(RunnerStatus::Placed));
        assert_eq!(order_profit(&placed), dec!(2.50));
        let won = settled(Side::Back, dec!(6.0), dec!(10), terms(RunnerStatus::Winner));
        assert_eq!(order_profit(&won), dec!(62.50));
        let lost = settled(Side::Back, dec!(6.0), dec!(10), terms(RunnerStatus::Loser));
        assert_eq!(order_profit(&lost), dec!(-20.00));
    }

    #[test]
    fn test_dead_heat() {
        let settlement = Settlement {
            dead_heat_divisor: 2,
            ..Settlement::new(RunnerStatus::Winner)
        };
        let order = settled(Side::Back, dec!(4.0), dec!(10), settlement);
        // 5 at 4.0 wins 15, the other 5 is lost
        assert_eq!(order_profit(&order), dec!(10.00));
    }
}
