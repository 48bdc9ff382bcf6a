//! Transactions: batched, validated order operations for one market
//!
//! A `Transaction` collects place/cancel/update/replace operations, runs
//! each through the control chain as it is requested, and on `execute`
//! (explicit, or when the transaction is dropped) turns the survivors into
//! order packages handed to a `PackageSink` exactly once.
//!
//! ```text
//! place_order ─┐
//! cancel_order ├─► controls ─► pending ─► execute ─► group / chunk ─► sink.submit
//! replace_order┘      │
//!                     └─ violation: order → Violation (place) or back to Executable
//! ```
//!
//! In atomic mode a single violation aborts the whole transaction: pending
//! places become `Violation`, pending mutations return to `Executable` and
//! nothing is submitted.
//!
//! Nested scopes (`Transaction::nested`) share the outer transaction; only
//! the outermost `execute` submits.

use crate::config::{ClientConfig, StrategyLimits, TransactionConfig};
use crate::controls::{ControlChain, ControlContext};
use crate::core::{IdSequence, OrderId, OrderStatus, PaddockError, PaddockResult, Side, StrategyId, TradeId};
use crate::execution::PackageSink;
use crate::markets::Market;
use crate::order::{
    Instruction, InstructionAction, OrderPackage, OrderType, PackageType, PersistenceType,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info, warn};

/// Client settings, limits and controls shared by every transaction
#[derive(Debug)]
pub struct TradingEnv {
    pub client: ClientConfig,
    pub transaction: TransactionConfig,
    pub default_limits: StrategyLimits,
    pub strategy_limits: HashMap<StrategyId, StrategyLimits>,
    pub controls: ControlChain,
    package_ids: IdSequence,
}

impl TradingEnv {
    pub fn new(client: ClientConfig, transaction: TransactionConfig, default_limits: StrategyLimits) -> Self {
        let controls = ControlChain::with_defaults(&client);
        Self {
            client,
            transaction,
            default_limits,
            strategy_limits: HashMap::new(),
            controls,
            package_ids: IdSequence::new(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.client.clone(),
            config.transaction.clone(),
            config.strategy_limits,
        )
    }

    pub fn with_controls(mut self, controls: ControlChain) -> Self {
        self.controls = controls;
        self
    }

    pub fn set_strategy_limits(&mut self, strategy: StrategyId, limits: StrategyLimits) {
        self.strategy_limits.insert(strategy, limits);
    }

    pub fn limits_for(&self, strategy: &StrategyId) -> StrategyLimits {
        self.strategy_limits
            .get(strategy)
            .copied()
            .unwrap_or(self.default_limits)
    }
}

pub struct Transaction<'a> {
    market: &'a mut Market,
    env: &'a mut TradingEnv,
    sink: &'a mut dyn PackageSink,
    now_ms: u64,
    pending: Vec<(OrderId, InstructionAction)>,
    depth: u32,
    aborted: bool,
}

impl<'a> Transaction<'a> {
    pub fn new(market: &'a mut Market, env: &'a mut TradingEnv, sink: &'a mut dyn PackageSink, now_ms: u64) -> Self {
        Self {
            market,
            env,
            sink,
            now_ms,
            pending: Vec::new(),
            depth: 0,
            aborted: false,
        }
    }

    pub fn market(&self) -> &Market {
        self.market
    }

    pub fn market_mut(&mut self) -> &mut Market {
        self.market
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Enter a nested scope; its `execute` defers to the outer one
    pub fn nested(&mut self) -> NestedTransaction<'_, 'a> {
        self.depth += 1;
        NestedTransaction { tx: self }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Create a pending order in `trade_id` and queue it for placement
    pub fn place(
        &mut self,
        trade_id: TradeId,
        side: Side,
        order_type: OrderType,
        market_version: Option<u64>,
    ) -> PaddockResult<OrderId> {
        self.ensure_open()?;
        let client = self.env.client.client_id.clone();
        let order_id = self
            .market
            .create_order(trade_id, client, side, order_type, self.now_ms)?;
        self.place_order(order_id, market_version)?;
        Ok(order_id)
    }

    /// Queue an existing pending order for placement
    pub fn place_order(&mut self, order_id: OrderId, market_version: Option<u64>) -> PaddockResult<()> {
        self.ensure_open()?;
        if self.is_queued(order_id, PackageType::Place) {
            return Ok(());
        }
        let order = self.market.try_order_mut(order_id)?;
        if order.status() != OrderStatus::Pending || order.submitted {
            return Err(PaddockError::OrderState {
                order_id,
                operation: "place",
                status: order.status(),
            });
        }
        order.market_version = market_version;
        self.queue(order_id, InstructionAction::Place)
    }

    /// Queue a cancel of `size_reduction`, or of everything remaining
    pub fn cancel_order(&mut self, order_id: OrderId, size_reduction: Option<Decimal>) -> PaddockResult<()> {
        self.mutate(order_id, OrderStatus::Cancelling, InstructionAction::Cancel { size_reduction }, "cancel")
    }

    pub fn update_order(&mut self, order_id: OrderId, persistence: PersistenceType) -> PaddockResult<()> {
        self.mutate(order_id, OrderStatus::Updating, InstructionAction::Update { persistence }, "update")
    }

    pub fn replace_order(&mut self, order_id: OrderId, new_price: Decimal) -> PaddockResult<()> {
        self.mutate(order_id, OrderStatus::Replacing, InstructionAction::Replace { new_price }, "replace")
    }

    fn mutate(
        &mut self,
        order_id: OrderId,
        in_flight: OrderStatus,
        action: InstructionAction,
        operation: &'static str,
    ) -> PaddockResult<()> {
        self.ensure_open()?;
        if self.is_queued(order_id, action.package_type()) {
            return Ok(());
        }
        let now_ms = self.now_ms;
        let order = self.market.try_order_mut(order_id)?;
        if !order.order_type.is_limit() || order.status() != OrderStatus::Executable {
            return Err(PaddockError::OrderState {
                order_id,
                operation,
                status: order.status(),
            });
        }
        order.set_status(in_flight, now_ms)?;
        self.queue(order_id, action)
    }

    fn ensure_open(&self) -> PaddockResult<()> {
        if self.aborted {
            Err(PaddockError::TransactionAborted)
        } else {
            Ok(())
        }
    }

    fn is_queued(&self, order_id: OrderId, package_type: PackageType) -> bool {
        self.pending
            .iter()
            .any(|(id, action)| *id == order_id && action.package_type() == package_type)
    }

    /// Validate and queue, rolling back the order on a violation
    fn queue(&mut self, order_id: OrderId, action: InstructionAction) -> PaddockResult<()> {
        let result = {
            let order = self
                .market
                .order(order_id)
                .ok_or(PaddockError::UnknownOrder(order_id))?;
            let ctx = ControlContext {
                market: self.market,
                client: &self.env.client,
                limits: self.env.limits_for(&order.strategy),
                now_ms: self.now_ms,
            };
            self.env.controls.validate(&ctx, order, &action)
        };

        match result {
            Ok(()) => {
                debug!(order_id = %order_id, action = %action.package_type(), "queued");
                self.pending.push((order_id, action));
                Ok(())
            }
            Err(err) => {
                self.roll_back(order_id, &action, &err)?;
                if self.env.transaction.atomic {
                    self.abort()?;
                }
                Err(err)
            }
        }
    }

    fn roll_back(&mut self, order_id: OrderId, action: &InstructionAction, err: &PaddockError) -> PaddockResult<()> {
        let now_ms = self.now_ms;
        let order = self.market.try_order_mut(order_id)?;
        match action {
            InstructionAction::Place => order.violation(err.to_string(), now_ms)?,
            _ => order.set_status(OrderStatus::Executable, now_ms)?,
        }
        let trade_id = order.trade_id;
        self.market.check_trade(trade_id, now_ms);
        Ok(())
    }

    /// Drop every pending operation
    fn abort(&mut self) -> PaddockResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let reason = PaddockError::TransactionAborted;
        for (order_id, action) in &pending {
            self.roll_back(*order_id, action, &reason)?;
        }
        self.env.controls.on_aborted(pending.len() as u32);
        self.aborted = true;
        warn!(
            market_id = %self.market.market_id,
            dropped = pending.len(),
            "transaction aborted"
        );
        Ok(())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Submit pending operations as packages, returning how many were sent
    ///
    /// A no-op inside a nested scope and after an abort.
    pub fn execute(&mut self) -> PaddockResult<usize> {
        if self.depth > 0 || self.aborted || self.pending.is_empty() {
            return Ok(0);
        }
        let pending = std::mem::take(&mut self.pending);
        let instructions = pending.len() as u32;

        // places grouped by the version they were priced against
        let mut groups: Vec<(PackageType, Option<u64>, Vec<(OrderId, InstructionAction)>)> = Vec::new();
        for package_type in [
            PackageType::Place,
            PackageType::Cancel,
            PackageType::Update,
            PackageType::Replace,
        ] {
            for (order_id, action) in pending.iter().filter(|(_, a)| a.package_type() == package_type) {
                let version = match package_type {
                    PackageType::Place => self.market.order(*order_id).and_then(|o| o.market_version),
                    _ => None,
                };
                match groups
                    .iter_mut()
                    .find(|(t, v, _)| *t == package_type && *v == version)
                {
                    Some((_, _, ops)) => ops.push((*order_id, *action)),
                    None => groups.push((package_type, version, vec![(*order_id, *action)])),
                }
            }
        }

        let mut submitted = 0;
        for (package_type, version, ops) in groups {
            let limit = self.env.transaction.package_limits.for_type(package_type);
            for chunk in ops.chunks(limit) {
                let package = self.build_package(package_type, version, chunk)?;
                info!(package = %package, "submitting");
                self.sink.submit(package);
                submitted += 1;
            }
        }
        self.env.controls.on_executed(instructions, self.now_ms);
        Ok(submitted)
    }

    fn build_package(
        &mut self,
        package_type: PackageType,
        market_version: Option<u64>,
        ops: &[(OrderId, InstructionAction)],
    ) -> PaddockResult<OrderPackage> {
        let mut instructions = Vec::with_capacity(ops.len());
        for (order_id, action) in ops {
            let order = self.market.try_order_mut(*order_id)?;
            if package_type == PackageType::Place {
                order.submitted = true;
            }
            instructions.push(Instruction::for_order(order, *action));
        }
        Ok(OrderPackage {
            id: self.env.package_ids.next_package(),
            market_id: self.market.market_id.clone(),
            client: self.env.client.client_id.clone(),
            package_type,
            instructions,
            market_version,
            bet_delay: self.market.book().bet_delay,
            created_at_ms: self.now_ms,
            attempts: 0,
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.execute() {
            warn!(error = %err, "transaction failed to execute on drop");
        }
    }
}

/// Nested scope over an outer transaction
pub struct NestedTransaction<'t, 'a> {
    tx: &'t mut Transaction<'a>,
}

impl<'a> Deref for NestedTransaction<'_, 'a> {
    type Target = Transaction<'a>;

    fn deref(&self) -> &Self::Target {
        self.tx
    }
}

impl<'a> DerefMut for NestedTransaction<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tx
    }
}

impl Drop for NestedTransaction<'_, '_> {
    fn drop(&mut self) {
        self.tx.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClientId, SelectionKey};
    use crate::data::{MarketBookBuilder, MarketStatus};
    use crate::execution::CollectingSink;
    use crate::order::PackageLimits;
    use rust_decimal_macros::dec;

    fn market() -> Market {
        Market::new(
            MarketBookBuilder::new("1.1")
                .version(3)
                .runner(1, |r| r.back(dec!(2.0), dec!(100)))
                .runner(2, |r| r.back(dec!(3.0), dec!(100)))
                .build(),
        )
    }

    fn env(atomic: bool) -> TradingEnv {
        TradingEnv::new(
            ClientConfig::default(),
            TransactionConfig {
                atomic,
                package_limits: PackageLimits::default(),
            },
            StrategyLimits::default(),
        )
    }

    fn trade(market: &mut Market) -> TradeId {
        market.open_trade(SelectionKey::selection(1), StrategyId::new("s"), 0)
    }

    #[test]
    fn test_execute_submits_once() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        let id = {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            let id = tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), Some(3)).unwrap();
            assert_eq!(tx.execute().unwrap(), 1);
            assert_eq!(tx.execute().unwrap(), 0);
            id
        };
        assert_eq!(sink.packages.len(), 1);
        let package = &sink.packages[0];
        assert_eq!(package.package_type, PackageType::Place);
        assert_eq!(package.market_version, Some(3));
        assert_eq!(package.instructions[0].order_id, id);
        assert!(market.order(id).unwrap().submitted);
    }

    #[test]
    fn test_drop_executes_pending() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None).unwrap();
        }
        assert_eq!(sink.packages.len(), 1);
    }

    #[test]
    fn test_violation_marks_place_only() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None).unwrap();
            let err = tx
                .place(trade, Side::Back, OrderType::limit(dec!(2.01), dec!(500)), None)
                .unwrap_err();
            assert!(matches!(err, PaddockError::Violation { .. }));
            assert!(!tx.is_aborted());
        }
        assert_eq!(sink.packages.len(), 1);
        assert_eq!(sink.packages[0].len(), 1);
        let statuses: Vec<_> = market.orders().map(|o| o.status()).collect();
        assert_eq!(statuses, vec![OrderStatus::Pending, OrderStatus::Violation]);
    }

    #[test]
    fn test_atomic_abort_submits_nothing() {
        let mut market = market();
        let mut env = env(true);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None).unwrap();
            assert!(tx
                .place(trade, Side::Back, OrderType::limit(dec!(2.01), dec!(500)), None)
                .is_err());
            assert!(tx.is_aborted());
            assert!(matches!(
                tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None),
                Err(PaddockError::TransactionAborted)
            ));
            assert_eq!(tx.execute().unwrap(), 0);
        }
        assert!(sink.packages.is_empty());
        assert!(market.orders().all(|o| !o.submitted && o.status() == OrderStatus::Violation));
    }

    #[test]
    fn test_mutations_require_executable_limit() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        let sp = market
            .create_order(trade, ClientId::new("c"), Side::Back, OrderType::MarketOnClose { liability: dec!(20) }, 0)
            .unwrap();
        market.order_mut(sp).unwrap().set_status(OrderStatus::Executable, 0).unwrap();

        let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
        let limit = tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None).unwrap();
        // still pending
        assert!(matches!(
            tx.cancel_order(limit, None),
            Err(PaddockError::OrderState { operation: "cancel", .. })
        ));
        assert!(matches!(
            tx.replace_order(sp, dec!(3.0)),
            Err(PaddockError::OrderState { operation: "replace", .. })
        ));
    }

    #[test]
    fn test_cancel_violation_reverts_to_executable() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        let id = market
            .create_order(trade, ClientId::new("c"), Side::Back, OrderType::limit(dec!(2.0), dec!(5)), 0)
            .unwrap();
        market.order_mut(id).unwrap().set_status(OrderStatus::Executable, 0).unwrap();
        let suspended = MarketBookBuilder::from_book(market.book())
            .status(MarketStatus::Suspended)
            .build();
        market.update_book(suspended);

        let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
        assert!(matches!(tx.cancel_order(id, None), Err(PaddockError::Violation { .. })));
        assert_eq!(tx.market().order(id).unwrap().status(), OrderStatus::Executable);
    }

    #[test]
    fn test_duplicate_operation_not_requeued() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        let id = market
            .create_order(trade, ClientId::new("c"), Side::Back, OrderType::limit(dec!(2.0), dec!(5)), 0)
            .unwrap();
        market.order_mut(id).unwrap().set_status(OrderStatus::Executable, 0).unwrap();
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            tx.cancel_order(id, None).unwrap();
            tx.cancel_order(id, None).unwrap();
            assert_eq!(tx.pending_len(), 1);
        }
        assert_eq!(sink.packages.len(), 1);
        assert_eq!(sink.packages[0].package_type, PackageType::Cancel);
    }

    #[test]
    fn test_nested_scope_defers_to_outer() {
        let mut market = market();
        let mut env = env(false);
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            {
                let mut inner = tx.nested();
                inner.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(5)), None).unwrap();
                assert_eq!(inner.execute().unwrap(), 0);
            }
            assert_eq!(tx.pending_len(), 1);
            assert_eq!(tx.execute().unwrap(), 1);
        }
        assert_eq!(sink.packages.len(), 1);
    }

    #[test]
    fn test_places_grouped_by_version_and_chunked() {
        let mut market = market();
        let mut env = TradingEnv::new(
            ClientConfig::default(),
            TransactionConfig {
                atomic: false,
                package_limits: PackageLimits {
                    place: 2,
                    ..PackageLimits::default()
                },
            },
            StrategyLimits::default(),
        );
        let mut sink = CollectingSink::default();
        let trade = trade(&mut market);
        {
            let mut tx = Transaction::new(&mut market, &mut env, &mut sink, 10);
            for _ in 0..3 {
                tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(2)), Some(3)).unwrap();
            }
            tx.place(trade, Side::Back, OrderType::limit(dec!(2.0), dec!(2)), Some(4)).unwrap();
            assert_eq!(tx.execute().unwrap(), 3);
        }
        let sizes: Vec<_> = sink.packages.iter().map(|p| (p.market_version, p.len())).collect();
        assert_eq!(sizes, vec![(Some(3), 2), (Some(3), 1), (Some(4), 1)]);
        let ids: Vec<_> = sink.packages.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
