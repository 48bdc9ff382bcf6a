//! Starting-price orders reconciled by the simulated exchange

use paddock_core::data::MarketBook;
use paddock_core::order::{LimitOrder, PersistenceType};
use paddock_core::testing::{closed_book, feed_of, instant_config, ScriptedStrategy};
use paddock_core::{BacktestEngine, MarketBookBuilder, OrderStatus, OrderType, SelectionKey, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn bsp_book(publish_time_ms: u64, reconciled: Option<Decimal>) -> MarketBook {
    let builder = MarketBookBuilder::new("1.600")
        .publish_time(publish_time_ms)
        .bsp_market(true)
        .bsp_reconciled(reconciled.is_some())
        .runner(1, |r| {
            let r = r.back(dec!(2.9), dec!(5)).lay(dec!(3.0), dec!(5));
            match reconciled {
                Some(sp) => r.actual_sp(sp),
                None => r,
            }
        })
        .runner(2, |r| r.back(dec!(1.5), dec!(5)));
    builder.build()
}

fn feed() -> paddock_core::HistoricalFeed {
    let reconciled = bsp_book(300, Some(dec!(3.4)));
    feed_of(vec![
        bsp_book(0, None),
        bsp_book(100, None),
        reconciled.clone(),
        bsp_book(350, Some(dec!(3.4))),
        closed_book(&reconciled, 400, &[1]),
    ])
}

fn run(order: (SelectionKey, Side, OrderType)) -> paddock_core::BacktestReport {
    let mut engine = BacktestEngine::new(&instant_config());
    engine.add_strategy(ScriptedStrategy::new("sp", vec![order]));
    engine.run(&[feed()]).unwrap()
}

#[test]
fn test_market_on_close_back_reconciled_once() {
    let report = run((
        SelectionKey::selection(1),
        Side::Back,
        OrderType::MarketOnClose { liability: dec!(10) },
    ));
    let order = &report.orders[0];
    assert_eq!(order.status, OrderStatus::ExecutionComplete);
    assert_eq!(order.size_matched, dec!(10));
    assert_eq!(order.average_price_matched, Some(dec!(3.4)));
    assert_eq!(order.profit, dec!(24.00));
}

#[test]
fn test_market_on_close_lay_stakes_from_liability() {
    let report = run((
        SelectionKey::selection(1),
        Side::Lay,
        OrderType::MarketOnClose { liability: dec!(12) },
    ));
    let order = &report.orders[0];
    // 12 of liability at 3.4 is a 5.00 stake
    assert_eq!(order.size_matched, dec!(5.00));
    assert_eq!(order.profit, dec!(-12.00));
}

#[test]
fn test_limit_on_close_lapses_when_price_unacceptable() {
    let report = run((
        SelectionKey::selection(1),
        Side::Back,
        OrderType::LimitOnClose {
            liability: dec!(10),
            price: dec!(4.0),
        },
    ));
    let order = &report.orders[0];
    assert_eq!(order.size_matched, dec!(0));
    assert_eq!(order.status, OrderStatus::Lapsed);
}

#[test]
fn test_unmatched_limit_goes_to_starting_price() {
    let limit = LimitOrder::new(dec!(3.6), dec!(10)).persistence(PersistenceType::MarketOnClose);
    let report = run((SelectionKey::selection(1), Side::Back, OrderType::Limit(limit)));
    let order = &report.orders[0];
    assert_eq!(order.size_matched, dec!(10));
    assert_eq!(order.average_price_matched, Some(dec!(3.4)));
    assert_eq!(order.status, OrderStatus::ExecutionComplete);
}
