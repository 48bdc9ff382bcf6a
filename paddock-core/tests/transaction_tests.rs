//! Transactions and trading controls driven by the backtest loop

use paddock_core::config::{StrategyLimits, TransactionConfig};
use paddock_core::engine::{Strategy, StrategyContext};
use paddock_core::testing::{closed_book, feed_of, instant_config, open_book, ScriptedStrategy, TEST_STREAM};
use paddock_core::{BacktestEngine, Config, OrderStatus, OrderType, SelectionKey, Side, StreamId};
use rust_decimal_macros::dec;

fn config(atomic: bool) -> Config {
    Config {
        transaction: TransactionConfig {
            atomic,
            ..TransactionConfig::default()
        },
        strategy_limits: StrategyLimits {
            max_order_exposure: dec!(50),
            max_selection_exposure: dec!(100),
        },
        ..instant_config()
    }
}

fn orders() -> Vec<(SelectionKey, Side, OrderType)> {
    vec![
        (SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(10))),
        (SelectionKey::selection(2), Side::Back, OrderType::limit(dec!(2.0), dec!(80))),
    ]
}

fn feed() -> paddock_core::HistoricalFeed {
    let open = open_book("1.300", 0, &[(1, dec!(2.0), dec!(2.02)), (2, dec!(2.0), dec!(2.02))], dec!(100));
    feed_of(vec![open.clone(), open.clone(), closed_book(&open, 100, &[1])])
}

#[test]
fn test_atomic_violation_sends_nothing() {
    let mut engine = BacktestEngine::new(&config(true));
    engine.add_strategy(ScriptedStrategy::new("atomic", orders()));
    let report = engine.run(&[feed()]).unwrap();

    assert_eq!(report.packages_executed, 0);
    assert_eq!(report.orders.len(), 2);
    assert!(report.orders.iter().all(|o| o.status == OrderStatus::Violation));
    assert!(report.orders.iter().all(|o| o.size_matched.is_zero()));
    assert_eq!(report.total_profit(), dec!(0));
}

#[test]
fn test_non_atomic_violation_keeps_valid_orders() {
    let mut engine = BacktestEngine::new(&config(false));
    engine.add_strategy(ScriptedStrategy::new("partial", orders()));
    let report = engine.run(&[feed()]).unwrap();

    assert_eq!(report.packages_executed, 1);
    let statuses: Vec<_> = report.orders.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![OrderStatus::ExecutionComplete, OrderStatus::Violation]);
    assert_eq!(report.total_profit(), dec!(10.00));
}

/// Places one back 2.0 x 40 on selection 1 per open snapshot, twice
struct BackTwice {
    streams: Vec<StreamId>,
    placed: usize,
}

impl Strategy for BackTwice {
    fn name(&self) -> &str {
        "back_twice"
    }

    fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
        if self.placed == 2 || !ctx.book().is_open() {
            return;
        }
        self.placed += 1;
        let _ = ctx.place_order(SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(40)));
    }
}

fn stacking_config() -> Config {
    Config {
        strategy_limits: StrategyLimits {
            max_order_exposure: dec!(50),
            max_selection_exposure: dec!(60),
        },
        ..instant_config()
    }
}

#[test]
fn test_selection_limit_counts_earlier_orders() {
    let mut engine = BacktestEngine::new(&stacking_config());
    engine.add_strategy(BackTwice {
        streams: vec![StreamId::new(TEST_STREAM)],
        placed: 0,
    });
    let report = engine.run(&[feed()]).unwrap();

    // the first bet is matched by the time the second is validated
    let statuses: Vec<_> = report.orders.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![OrderStatus::ExecutionComplete, OrderStatus::Violation]);
}

#[test]
fn test_pending_orders_in_same_transaction_not_counted() {
    let mut engine = BacktestEngine::new(&stacking_config());
    engine.add_strategy(ScriptedStrategy::new(
        "stacked",
        vec![
            (SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(40))),
            (SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(40))),
        ],
    ));
    let report = engine.run(&[feed()]).unwrap();

    let statuses: Vec<_> = report.orders.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![OrderStatus::ExecutionComplete, OrderStatus::ExecutionComplete]);
}

#[test]
fn test_no_orders_without_open_snapshot() {
    let open = open_book("1.301", 0, &[(1, dec!(2.0), dec!(2.02))], dec!(100));
    let suspended = paddock_core::MarketBookBuilder::from_book(&open)
        .publish_time(50)
        .status(paddock_core::data::MarketStatus::Suspended)
        .build();
    // only a suspended snapshot is ever seen while the strategy is waiting
    let feed = feed_of(vec![suspended, closed_book(&open, 100, &[1])]);

    let mut engine = BacktestEngine::new(&instant_config());
    engine.add_strategy(ScriptedStrategy::new("late", orders()));
    let report = engine.run(&[feed]).unwrap();
    assert!(report.orders.is_empty());
    assert_eq!(report.packages_executed, 0);
}
