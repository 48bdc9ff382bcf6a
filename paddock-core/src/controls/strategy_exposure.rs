//! Per-strategy exposure limits

use super::{ControlContext, ControlViolation, TradingControl};
use crate::core::{money, OrderStatus, Side};
use crate::exposure;
use crate::order::{InstructionAction, Order, OrderType};
use rust_decimal::Decimal;
use tracing::debug;

/// Rejects places and replaces that would breach the strategy's order or
/// selection exposure limits
#[derive(Debug, Default, Clone, Copy)]
pub struct StrategyExposure;

impl TradingControl for StrategyExposure {
    fn name(&self) -> &'static str {
        "STRATEGY_EXPOSURE"
    }

    fn validate(
        &mut self,
        ctx: &ControlContext<'_>,
        order: &Order,
        action: &InstructionAction,
    ) -> Result<(), ControlViolation> {
        let price = match action {
            InstructionAction::Place => order.order_type.price(),
            InstructionAction::Replace { new_price } => Some(*new_price),
            _ => return Ok(()),
        };

        let order_exposure = order_exposure(order, price);
        if order_exposure > ctx.limits.max_order_exposure {
            return Err(ControlViolation::OrderExposure {
                exposure: order_exposure,
                limit: ctx.limits.max_order_exposure,
            });
        }

        // the order itself is replaced by a hypothetical leg at the new price
        let mut calculator = exposure::calculator_for(
            ctx.market.strategy_selection_orders(&order.strategy, order.selection),
            Some(order.id),
        );
        match (&order.order_type, price) {
            (OrderType::Limit(limit), Some(price)) => {
                if let Some(matched_price) = order.average_price_matched() {
                    calculator.add_matched(order.side, matched_price, order.size_matched());
                }
                let working = match action {
                    InstructionAction::Replace { .. } => order.size_remaining(),
                    _ => limit.size,
                };
                calculator.add_unmatched(order.side, price, working);
            }
            _ => {
                calculator.add_starting_price(order.side, order.order_type.liability().unwrap_or_default());
            }
        }
        let potential = calculator.finish().exposure();
        debug!(order_id = %order.id, %order_exposure, %potential, "strategy exposure");
        if potential > ctx.limits.max_selection_exposure {
            return Err(ControlViolation::SelectionExposure {
                exposure: potential,
                limit: ctx.limits.max_selection_exposure,
            });
        }
        Ok(())
    }
}

/// Worst loss of the order alone at `price`
fn order_exposure(order: &Order, price: Option<Decimal>) -> Decimal {
    match (&order.order_type, price) {
        (OrderType::Limit(limit), Some(price)) => {
            let size = match order.status() {
                OrderStatus::Pending => limit.size,
                _ => order.size_remaining(),
            };
            match order.side {
                Side::Back => size,
                Side::Lay => money::round2((price - Decimal::ONE) * size),
            }
        }
        _ => order.order_type.liability().unwrap_or_default(),
    }
}
