//! Multi-feed replay ordering and run-to-run determinism

use paddock_core::config::SimulationConfig;
use paddock_core::core::StreamId;
use paddock_core::engine::{HistoricalFeed, Strategy, StrategyContext};
use paddock_core::testing::{closed_book, open_book, ScriptedStrategy, TEST_STREAM};
use paddock_core::{BacktestEngine, Config, MarketBookBuilder, MarketId, OrderType, SelectionKey, Side};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;

/// Records every snapshot it is shown
struct Recorder {
    streams: Vec<StreamId>,
    seen: Arc<Mutex<Vec<(MarketId, u64)>>>,
}

impl Strategy for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
        let book = ctx.book();
        self.seen.lock().push((book.market_id.clone(), book.publish_time_ms));
    }
}

/// Backs runner 1 at 2.0 for 10 once in every market it sees
struct BackEveryMarket {
    streams: Vec<StreamId>,
    backed: HashSet<MarketId>,
}

impl Strategy for BackEveryMarket {
    fn name(&self) -> &str {
        "back_every_market"
    }

    fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
        let market_id = ctx.market().market_id.clone();
        if !ctx.book().is_open() || self.backed.contains(&market_id) {
            return;
        }
        if ctx
            .place_order(SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(10)))
            .is_ok()
        {
            self.backed.insert(market_id);
        }
    }
}

fn event_feed(market_id: &str, event: &str, times: &[u64]) -> HistoricalFeed {
    let updates = times
        .iter()
        .map(|&t| {
            vec![MarketBookBuilder::new(market_id)
                .event(event)
                .publish_time(t)
                .runner(1, |r| r.back(dec!(2.0), dec!(10)))
                .build()]
        })
        .collect();
    HistoricalFeed::new(StreamId::new(TEST_STREAM), market_id, updates)
}

#[test]
fn test_same_event_feeds_interleave() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut engine = BacktestEngine::new(&Config::default());
    engine.add_strategy(Recorder {
        streams: vec![StreamId::new(TEST_STREAM)],
        seen: Arc::clone(&seen),
    });
    let feeds = vec![
        event_feed("1.1", "e", &[1_000, 3_000]),
        event_feed("1.2", "e", &[2_000, 4_000]),
        event_feed("1.3", "other", &[500]),
    ];
    engine.run(&feeds).unwrap();

    let seen = seen.lock();
    let times: Vec<u64> = seen.iter().map(|(_, t)| *t).collect();
    assert_eq!(times, vec![1_000, 2_000, 3_000, 4_000, 500]);
    assert_eq!(seen[1].0, MarketId::new("1.2"));
}

#[test]
fn test_identical_runs_give_identical_reports() {
    let run = || {
        let open = open_book("1.400", 0, &[(1, dec!(3.0), dec!(3.1)), (2, dec!(1.5), dec!(1.52))], dec!(6));
        let traded = MarketBookBuilder::from_book(&open)
            .publish_time(1_000)
            .update_runner(1, |r| r.traded(dec!(3.2), dec!(40)))
            .build();
        let feed = HistoricalFeed::new(
            StreamId::new(TEST_STREAM),
            "determinism",
            vec![
                vec![open.clone()],
                vec![MarketBookBuilder::from_book(&open).publish_time(500).build()],
                vec![traded],
                vec![closed_book(&open, 2_000, &[1])],
            ],
        );
        let config = Config {
            simulation: SimulationConfig {
                place_latency_ms: 120,
                ..SimulationConfig::default()
            },
            ..Config::default()
        };
        let mut engine = BacktestEngine::new(&config);
        engine.add_strategy(ScriptedStrategy::new(
            "determinism",
            vec![
                (SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(3.0), dec!(10))),
                (SelectionKey::selection(2), Side::Lay, OrderType::limit(dec!(1.52), dec!(4))),
            ],
        ));
        engine.run(&[feed]).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.orders.len(), 2);
    // 6 matched on placement, the rest from traded volume at 3.2
    assert_eq!(first.orders[0].size_matched, dec!(10));
}

#[test]
fn test_closed_market_ignores_later_snapshots() {
    let open = open_book("1.500", 0, &[(1, dec!(2.0), dec!(2.02))], dec!(10));
    let closed = closed_book(&open, 100, &[1]);
    let late = MarketBookBuilder::from_book(&open).publish_time(200).build();
    let feed = HistoricalFeed::new(
        StreamId::new(TEST_STREAM),
        "late",
        vec![vec![open], vec![closed], vec![late]],
    );

    let mut engine = BacktestEngine::new(&Config::default());
    let report = engine.run(&[feed]).unwrap();
    assert_eq!(report.markets.len(), 1);
    assert_eq!(report.snapshots_processed, 2);
    assert!(report.unsettled_markets.is_empty());
}

#[test]
fn test_earlier_feed_listed_second_still_executes() {
    let feed_for = |market_id: &str, start: u64| {
        let open = open_book(market_id, start, &[(1, dec!(2.0), dec!(2.02))], dec!(20));
        let later = MarketBookBuilder::from_book(&open).publish_time(start + 1_000).build();
        HistoricalFeed::new(
            StreamId::new(TEST_STREAM),
            market_id,
            vec![vec![open.clone()], vec![later], vec![closed_book(&open, start + 2_000, &[1])]],
        )
    };
    let mut engine = BacktestEngine::new(&Config::default());
    engine.add_strategy(BackEveryMarket {
        streams: vec![StreamId::new(TEST_STREAM)],
        backed: HashSet::new(),
    });
    let report = engine.run(&[feed_for("1.1", 900_000), feed_for("1.2", 100_000)]).unwrap();

    let matched: Vec<_> = report
        .orders
        .iter()
        .map(|o| (o.market_id.clone(), o.size_matched))
        .collect();
    assert_eq!(
        matched,
        vec![(MarketId::new("1.1"), dec!(10)), (MarketId::new("1.2"), dec!(10))]
    );
    assert_eq!(report.packages_executed, 2);
    assert_eq!(report.total_profit(), dec!(20.00));
}
