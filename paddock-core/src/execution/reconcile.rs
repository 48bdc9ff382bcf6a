//! Applying exchange responses to a market's orders
//!
//! The simulated exchange and the live worker pool both end up here: an
//! instruction report moves the order through its lifecycle, indexes its
//! bet id and marks the trade live. Live reports also carry the ledger
//! (matched / cancelled sizes), which is synced onto the order first.

use super::types::{ExecutionEvent, ExecutionOutcome, InstructionReport, InstructionStatus};
use crate::core::{OrderId, OrderStatus, PaddockError, PaddockResult};
use crate::markets::Market;
use crate::order::{InstructionAction, OrderPackage, OrderType};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// Move the order after the exchange answered `action`
///
/// Returns the successor's id when a replace created one.
pub fn resolve_instruction(
    market: &mut Market,
    action: &InstructionAction,
    report: &InstructionReport,
    now_ms: u64,
) -> PaddockResult<Option<OrderId>> {
    let order_id = report.order_id;
    let order = market
        .order(order_id)
        .ok_or(PaddockError::UnknownOrder(order_id))?;
    if order.is_terminal() {
        // resolved by the stream while the instruction was in flight
        debug!(order_id = %order_id, status = %order.status(), "instruction answered after completion");
        return Ok(None);
    }
    match (report.status, action) {
        (InstructionStatus::Success, InstructionAction::Place) => {
            accept(market, order_id, report, now_ms)?;
            Ok(None)
        }
        (InstructionStatus::Success, InstructionAction::Replace { new_price }) => {
            let successor = spawn_replacement(market, order_id, *new_price, report.size_cancelled, now_ms)?;
            market.try_order_mut(order_id)?.set_status(OrderStatus::Executable, now_ms)?;
            market.on_order_changed(order_id, now_ms)?;
            Ok(successor)
        }
        (InstructionStatus::Success, _) => {
            market.try_order_mut(order_id)?.set_status(OrderStatus::Executable, now_ms)?;
            market.on_order_changed(order_id, now_ms)?;
            Ok(None)
        }
        (InstructionStatus::Failure, InstructionAction::Place) => {
            let order = market.try_order_mut(order_id)?;
            order.last_error = report.error_code;
            let remaining = order.size_remaining();
            match report.error_code {
                Some(code) if code.voids_order() => order.record_void(remaining),
                _ => order.record_lapse(remaining),
            };
            warn!(order_id = %order_id, code = ?report.error_code, "placement failed");
            market.on_order_changed(order_id, now_ms)?;
            Ok(None)
        }
        (InstructionStatus::Failure, _) => {
            let order = market.try_order_mut(order_id)?;
            order.last_error = report.error_code;
            order.set_status(OrderStatus::Executable, now_ms)?;
            info!(order_id = %order_id, code = ?report.error_code, "mutation refused");
            market.on_order_changed(order_id, now_ms)?;
            Ok(None)
        }
        (InstructionStatus::Timeout, action) => {
            give_up(market, order_id, action, now_ms)?;
            Ok(None)
        }
    }
}

/// Placement accepted: index the bet, mark the trade live, resolve
pub(crate) fn accept(
    market: &mut Market,
    order_id: OrderId,
    report: &InstructionReport,
    now_ms: u64,
) -> PaddockResult<()> {
    let order = market.try_order_mut(order_id)?;
    order.set_status(OrderStatus::Executable, now_ms)?;
    let trade_id = order.trade_id;
    if let Some(bet_id) = report.bet_id {
        order.bet_id = Some(bet_id);
        market.blotter.set_bet_id(order_id, bet_id);
    }
    if let Some(trade) = market.trades.trade_mut(trade_id) {
        trade.mark_live();
    }
    market.on_order_changed(order_id, now_ms)
}

/// Create the order that continues `original` at `new_price`
///
/// The successor sits in the same trade, is linked both ways, and is left
/// `Pending` for the caller to place.
pub(crate) fn spawn_replacement(
    market: &mut Market,
    original: OrderId,
    new_price: Decimal,
    size: Decimal,
    now_ms: u64,
) -> PaddockResult<Option<OrderId>> {
    if size <= Decimal::ZERO {
        return Ok(None);
    }
    let (trade_id, client, side, order_type) = {
        let order = market
            .order(original)
            .ok_or(PaddockError::UnknownOrder(original))?;
        let Some(limit) = order.order_type.as_limit() else {
            return Err(PaddockError::OrderState {
                order_id: original,
                operation: "replace",
                status: order.status(),
            });
        };
        let mut limit = *limit;
        limit.price = new_price;
        limit.size = size;
        (order.trade_id, order.client.clone(), order.side, OrderType::Limit(limit))
    };
    let successor = market.create_order(trade_id, client, side, order_type, now_ms)?;
    {
        let order = market.try_order_mut(successor)?;
        order.replaces = Some(original);
        order.submitted = true;
    }
    market.try_order_mut(original)?.replaced_by = Some(successor);
    info!(order_id = %original, successor = %successor, %new_price, %size, "replaced");
    Ok(Some(successor))
}

/// The exchange never answered: places lapse, mutations return to
/// `Executable`
fn give_up(market: &mut Market, order_id: OrderId, action: &InstructionAction, now_ms: u64) -> PaddockResult<()> {
    let order = market.try_order_mut(order_id)?;
    if order.is_terminal() {
        return Ok(());
    }
    match action {
        InstructionAction::Place => {
            let remaining = order.size_remaining();
            order.record_lapse(remaining);
        }
        _ => order.set_status(OrderStatus::Executable, now_ms)?,
    }
    market.on_order_changed(order_id, now_ms)
}

/// Sync an order's ledger from a live report
///
/// The exchange reports cumulative sizes; only the increase is recorded.
fn sync_ledger(market: &mut Market, report: &InstructionReport, now_ms: u64) -> PaddockResult<()> {
    let order = market.try_order_mut(report.order_id)?;
    if let Some(placed_at) = report.placed_at_ms {
        order.placed_at_ms.get_or_insert(placed_at);
    }
    let new_matched = report.size_matched - order.size_matched();
    if new_matched > Decimal::ZERO {
        let price = report
            .average_price_matched
            .or_else(|| order.order_type.price())
            .unwrap_or_default();
        order.record_fill(now_ms, price, new_matched);
    }
    Ok(())
}

/// Apply a worker-pool event to the market it belongs to
///
/// `package` is the package the event answers; its instructions pair each
/// report with its action.
pub fn apply_execution_event(
    market: &mut Market,
    package: &OrderPackage,
    event: &ExecutionEvent,
    now_ms: u64,
) -> PaddockResult<()> {
    match &event.outcome {
        ExecutionOutcome::Completed(reports) => {
            for report in reports {
                let Some(instruction) = package.instructions.iter().find(|i| i.order_id == report.order_id) else {
                    warn!(order_id = %report.order_id, package_id = %package.id, "report for unknown instruction");
                    continue;
                };
                if report.is_success() && instruction.action == InstructionAction::Place {
                    sync_ledger(market, report, now_ms)?;
                } else if report.is_success() && matches!(instruction.action, InstructionAction::Cancel { .. }) {
                    market.try_order_mut(report.order_id)?.record_cancel(report.size_cancelled);
                } else if report.is_success() && matches!(instruction.action, InstructionAction::Replace { .. }) {
                    market.try_order_mut(report.order_id)?.record_cancel(report.size_cancelled);
                }
                let successor = resolve_instruction(market, &instruction.action, report, now_ms)?;
                if let Some(successor) = successor {
                    // the exchange placed the replacement in the same call
                    let placed = InstructionReport {
                        order_id: successor,
                        size_cancelled: Decimal::ZERO,
                        size_matched: Decimal::ZERO,
                        average_price_matched: None,
                        ..report.clone()
                    };
                    accept(market, successor, &placed, now_ms)?;
                }
            }
            Ok(())
        }
        ExecutionOutcome::Failed(err) => {
            error!(package_id = %event.package_id, attempts = event.attempts, error = %err, "package failed");
            for instruction in &package.instructions {
                give_up(market, instruction.order_id, &instruction.action, now_ms)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BetId, ClientId, InstructionErrorCode, PackageId, SelectionKey, Side, StrategyId};
    use crate::data::MarketBookBuilder;
    use crate::order::{Instruction, PackageType};
    use rust_decimal_macros::dec;

    fn market_with_pending(order_type: OrderType) -> (Market, OrderId) {
        let mut market = Market::new(MarketBookBuilder::new("1.1").runner(1, |r| r).build());
        let trade = market.open_trade(SelectionKey::selection(1), StrategyId::new("s"), 0);
        let id = market
            .create_order(trade, ClientId::new("c"), Side::Back, order_type, 0)
            .unwrap();
        (market, id)
    }

    fn package(market: &Market, id: OrderId, action: InstructionAction) -> OrderPackage {
        let order = market.order(id).unwrap();
        OrderPackage {
            id: PackageId(1),
            market_id: market.market_id.clone(),
            client: ClientId::new("c"),
            package_type: action.package_type(),
            instructions: vec![Instruction::for_order(order, action)],
            market_version: None,
            bet_delay: 0,
            created_at_ms: 0,
            attempts: 1,
        }
    }

    fn event(package: &OrderPackage, outcome: ExecutionOutcome) -> ExecutionEvent {
        ExecutionEvent {
            package_id: package.id,
            market_id: package.market_id.clone(),
            package_type: package.package_type,
            order_ids: package.order_ids().collect(),
            attempts: 1,
            outcome,
        }
    }

    #[test]
    fn test_placement_failure_voids_on_runner_removed() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        let report = InstructionReport::failure(id, InstructionErrorCode::RunnerRemoved);
        resolve_instruction(&mut market, &InstructionAction::Place, &report, 1).unwrap();
        let order = market.order(id).unwrap();
        assert_eq!(order.status(), OrderStatus::Voided);
        assert_eq!(order.last_error, Some(InstructionErrorCode::RunnerRemoved));
    }

    #[test]
    fn test_placement_failure_lapses_otherwise() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        let report = InstructionReport::failure(id, InstructionErrorCode::BetLapsedPriceImprovementTooLarge);
        resolve_instruction(&mut market, &InstructionAction::Place, &report, 1).unwrap();
        assert_eq!(market.order(id).unwrap().status(), OrderStatus::Lapsed);
    }

    #[test]
    fn test_live_place_syncs_matched_size() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        let pkg = package(&market, id, InstructionAction::Place);
        let report = InstructionReport {
            bet_id: Some(BetId(77)),
            placed_at_ms: Some(5),
            size_matched: dec!(2),
            average_price_matched: Some(dec!(2.02)),
            ..InstructionReport::failure(id, InstructionErrorCode::ErrorInOrder)
        };
        let report = InstructionReport {
            status: InstructionStatus::Success,
            error_code: None,
            ..report
        };
        apply_execution_event(&mut market, &pkg, &event(&pkg, ExecutionOutcome::Completed(vec![report])), 10).unwrap();
        let order = market.order(id).unwrap();
        assert_eq!(order.status(), OrderStatus::Executable);
        assert_eq!(order.size_matched(), dec!(2));
        assert_eq!(order.size_remaining(), dec!(3));
        assert_eq!(market.blotter.by_bet_id(BetId(77)), Some(id));
    }

    #[test]
    fn test_retry_exhausted_lapses_places() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        let pkg = package(&market, id, InstructionAction::Place);
        let failed = ExecutionOutcome::Failed(PaddockError::RetryExhausted {
            package_id: pkg.id,
            attempts: 3,
            last_error: "timeout".to_string(),
        });
        apply_execution_event(&mut market, &pkg, &event(&pkg, failed), 10).unwrap();
        assert_eq!(market.order(id).unwrap().status(), OrderStatus::Lapsed);
        assert_eq!(pkg.package_type, PackageType::Place);
    }

    #[test]
    fn test_replace_spawns_linked_successor() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        market.order_mut(id).unwrap().set_status(OrderStatus::Executable, 0).unwrap();
        market.order_mut(id).unwrap().set_status(OrderStatus::Replacing, 0).unwrap();
        let cancelled = market.order_mut(id).unwrap().record_cancel(dec!(5));
        let report = InstructionReport::cancelled(market.order(id).unwrap(), cancelled);
        let successor = resolve_instruction(&mut market, &InstructionAction::Replace { new_price: dec!(2.5) }, &report, 1)
            .unwrap()
            .unwrap();

        let original = market.order(id).unwrap();
        assert_eq!(original.status(), OrderStatus::ExecutionComplete);
        assert_eq!(original.replaced_by, Some(successor));
        let next = market.order(successor).unwrap();
        assert_eq!(next.replaces, Some(id));
        assert_eq!(next.order_type.price(), Some(dec!(2.5)));
        assert_eq!(next.size(), dec!(5));
        assert_eq!(next.trade_id, original.trade_id);
    }

    #[test]
    fn test_refused_cancel_returns_to_executable() {
        let (mut market, id) = market_with_pending(OrderType::limit(dec!(2), dec!(5)));
        market.order_mut(id).unwrap().set_status(OrderStatus::Executable, 0).unwrap();
        market.order_mut(id).unwrap().set_status(OrderStatus::Cancelling, 0).unwrap();
        let report = InstructionReport::failure(id, InstructionErrorCode::MarketNotOpenForBetting);
        resolve_instruction(&mut market, &InstructionAction::Cancel { size_reduction: None }, &report, 1).unwrap();
        assert_eq!(market.order(id).unwrap().status(), OrderStatus::Executable);
    }
}
