//! Market state checks

use super::{ControlContext, ControlViolation, TradingControl};
use crate::data::{MarketStatus, RunnerStatus};
use crate::order::{InstructionAction, Order};

/// Market must be open; starting-price orders need a pre-play BSP market
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketValidation;

impl TradingControl for MarketValidation {
    fn name(&self) -> &'static str {
        "MARKET_VALIDATION"
    }

    fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        order: &Order,
        action: &InstructionAction,
    ) -> Result<(), ControlViolation> {
        let book = ctx.market.book();
        if ctx.market.is_closed() || book.status == MarketStatus::Closed {
            return Err(ControlViolation::MarketClosed);
        }
        if book.status != MarketStatus::Open {
            return Err(ControlViolation::MarketNotOpen {
                status: book.status,
            });
        }
        if !matches!(action, InstructionAction::Place) {
            return Ok(());
        }

        if !order.order_type.is_limit() && (!book.bsp_market || book.inplay) {
            return Err(ControlViolation::StartingPriceUnavailable {
                inplay: book.inplay,
                bsp_market: book.bsp_market,
            });
        }
        match book.runner(&order.selection) {
            Some(runner) if runner.status == RunnerStatus::Active => Ok(()),
            _ => Err(ControlViolation::RunnerNotActive {
                selection: order.selection,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::controls::test_support::{ctx, market_with_order};
    use crate::core::Side;
    use crate::data::MarketBookBuilder;
    use crate::order::OrderType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_market_passes() {
        let book = MarketBookBuilder::new("1.1").runner(1, |r| r).build();
        let (market, id) = market_with_order(book, Side::Back, OrderType::limit(dec!(2), dec!(5)));
        let client = ClientConfig::default();
        let result = MarketValidation.validate(&ctx(&market, &client), market.order(id).unwrap(), &InstructionAction::Place);
        assert!(result.is_ok());
    }

    #[test]
    fn test_suspended_rejected_for_cancel_too() {
        let book = MarketBookBuilder::new("1.1")
            .status(MarketStatus::Suspended)
            .runner(1, |r| r)
            .build();
        let (market, id) = market_with_order(book, Side::Back, OrderType::limit(dec!(2), dec!(5)));
        let client = ClientConfig::default();
        let result = MarketValidation.validate(
            &ctx(&market, &client),
            market.order(id).unwrap(),
            &InstructionAction::Cancel { size_reduction: None },
        );
        assert_eq!(
            result,
            Err(ControlViolation::MarketNotOpen {
                status: MarketStatus::Suspended
            })
        );
    }

    #[test]
    fn test_starting_price_needs_bsp_market_pre_play() {
        let book = MarketBookBuilder::new("1.1")
            .bsp_market(true)
            .inplay(true)
            .runner(1, |r| r)
            .build();
        let (market, id) = market_with_order(book, Side::Back, OrderType::MarketOnClose { liability: dec!(20) });
        let client = ClientConfig::default();
        let result = MarketValidation.validate(&ctx(&market, &client), market.order(id).unwrap(), &InstructionAction::Place);
        assert!(matches!(result, Err(ControlViolation::StartingPriceUnavailable { inplay: true, .. })));
    }

    #[test]
    fn test_removed_runner_rejected() {
        let book = MarketBookBuilder::new("1.1")
            .runner(1, |r| r.status(RunnerStatus::Removed))
            .build();
        let (market, id) = market_with_order(book, Side::Back, OrderType::limit(dec!(2), dec!(5)));
        let client = ClientConfig::default();
        let result = MarketValidation.validate(&ctx(&market, &client), market.order(id).unwrap(), &InstructionAction::Place);
        assert!(matches!(result, Err(ControlViolation::RunnerNotActive { .. })));
    }
}
