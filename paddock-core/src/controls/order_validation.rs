//! Order field checks: ladder prices and exchange stake minimums

use super::{ControlContext, ControlViolation, TradingControl};
use crate::core::{money, Side};
use crate::data::PriceLadderKind;
use crate::order::{InstructionAction, Order, OrderType};
use rust_decimal::Decimal;

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderValidation;

impl TradingControl for OrderValidation {
    fn name(&self) -> &'static str {
        "ORDER_VALIDATION"
    }

    fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        order: &Order,
        action: &InstructionAction,
    ) -> Result<(), ControlViolation> {
        match (action, &order.order_type) {
            (InstructionAction::Place, OrderType::Limit(limit)) => {
                check_price(limit.price_ladder, limit.price)?;
                check_size(limit.size)?;
                if ctx.client.min_bet_validation
                    && limit.size < ctx.client.min_bet_size
                    && limit.size * limit.price < ctx.client.min_bet_payout
                {
                    return Err(ControlViolation::BelowMinimumStake {
                        size: limit.size,
                        minimum: ctx.client.min_bet_size,
                    });
                }
                Ok(())
            }
            (InstructionAction::Place, OrderType::LimitOnClose { price, liability }) => {
                check_price(PriceLadderKind::Classic, *price)?;
                check_liability(ctx, order.side, *liability)
            }
            (InstructionAction::Place, OrderType::MarketOnClose { liability }) => {
                check_liability(ctx, order.side, *liability)
            }
            (InstructionAction::Replace { new_price }, OrderType::Limit(limit)) => {
                check_price(limit.price_ladder, *new_price)
            }
            _ => Ok(()),
        }
    }
}

fn check_price(ladder: PriceLadderKind, price: Decimal) -> Result<(), ControlViolation> {
    if ladder.is_valid_price(price) {
        Ok(())
    } else {
        Err(ControlViolation::InvalidPrice { price })
    }
}

fn check_size(size: Decimal) -> Result<(), ControlViolation> {
    if size > Decimal::ZERO && money::has_at_most_2dp(size) {
        Ok(())
    } else {
        Err(ControlViolation::InvalidSize { size })
    }
}

fn check_liability(ctx: &ControlContext<'_>, side: Side, liability: Decimal) -> Result<(), ControlViolation> {
    check_size(liability)?;
    if ctx.client.min_bet_validation && side == Side::Back && liability < ctx.client.min_bsp_liability {
        return Err(ControlViolation::BelowMinimumLiability {
            liability,
            minimum: ctx.client.min_bsp_liability,
        });
    }
    Ok(())
}
