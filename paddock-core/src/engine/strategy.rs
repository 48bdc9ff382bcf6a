//! Strategy interface
//!
//! Strategies subscribe to stream ids and see every snapshot of markets
//! carried by those streams. Trading goes through a `StrategyContext`,
//! which opens trades under the strategy's id and hands out transactions
//! bound to the current market and virtual time.

use super::settlement::ClearedMarket;
use crate::core::{OrderId, PaddockResult, SelectionKey, Side, StrategyId, StreamId, TradeId};
use crate::data::MarketBook;
use crate::execution::PackageSink;
use crate::exposure::{self, SelectionExposure};
use crate::markets::Market;
use crate::order::OrderType;
use crate::transaction::{Transaction, TradingEnv};
use rust_decimal::Decimal;
use tracing::debug;

pub trait Strategy {
    /// Unique name; orders are attributed to it
    fn name(&self) -> &str;

    /// Streams this strategy wants snapshots from
    fn stream_ids(&self) -> &[StreamId];

    fn start(&mut self) {}

    /// Cheap filter run before `process_market_book`
    fn check_market_book(&mut self, _market: &Market) -> bool {
        true
    }

    fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>);

    /// Called once a market has been settled, before it is evicted
    fn process_closed_market(&mut self, _market: &Market, _cleared: &ClearedMarket) {}

    fn finish(&mut self) {}

    fn strategy_id(&self) -> StrategyId {
        StrategyId::new(self.name())
    }

    fn is_subscribed(&self, stream_id: &StreamId) -> bool {
        self.stream_ids().iter().any(|s| s == stream_id)
    }
}

/// What a strategy can touch while handling one snapshot
pub struct StrategyContext<'a> {
    market: &'a mut Market,
    env: &'a mut TradingEnv,
    sink: &'a mut dyn PackageSink,
    strategy: StrategyId,
    now_ms: u64,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        market: &'a mut Market,
        env: &'a mut TradingEnv,
        sink: &'a mut dyn PackageSink,
        strategy: StrategyId,
        now_ms: u64,
    ) -> Self {
        Self {
            market,
            env,
            sink,
            strategy,
            now_ms,
        }
    }

    pub fn market(&self) -> &Market {
        self.market
    }

    pub fn book(&self) -> &MarketBook {
        self.market.book()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy
    }

    pub fn open_trade(&mut self, selection: SelectionKey) -> TradeId {
        self.market.open_trade(selection, self.strategy.clone(), self.now_ms)
    }

    /// A transaction on this market; it executes when dropped
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction::new(self.market, self.env, self.sink, self.now_ms)
    }

    /// Open a trade and place one order in its own transaction
    pub fn place_order(
        &mut self,
        selection: SelectionKey,
        side: Side,
        order_type: OrderType,
    ) -> PaddockResult<OrderId> {
        let trade = self.open_trade(selection);
        let version = Some(self.market.book().version);
        let mut tx = self.transaction();
        let order_id = tx.place(trade, side, order_type, version)?;
        tx.execute()?;
        debug!(order_id = %order_id, "strategy placed order");
        Ok(order_id)
    }

    pub fn cancel_order(&mut self, order_id: OrderId) -> PaddockResult<()> {
        let mut tx = self.transaction();
        tx.cancel_order(order_id, None)?;
        tx.execute().map(|_| ())
    }

    pub fn replace_order(&mut self, order_id: OrderId, new_price: Decimal) -> PaddockResult<()> {
        let mut tx = self.transaction();
        tx.replace_order(order_id, new_price)?;
        tx.execute().map(|_| ())
    }

    /// This strategy's exposure on one selection
    pub fn selection_exposure(&self, selection: SelectionKey) -> SelectionExposure {
        exposure::strategy_selection_exposure(self.market, &self.strategy, selection, None)
    }

    /// This strategy's worst-case loss across the market
    pub fn market_exposure(&self) -> Decimal {
        exposure::strategy_market_exposure(self.market, &self.strategy)
    }
}

/// Run every subscribed strategy on the market's current snapshot
pub(crate) fn dispatch_book(
    strategies: &mut [Box<dyn Strategy>],
    stream_id: &StreamId,
    market: &mut Market,
    env: &mut TradingEnv,
    sink: &mut dyn PackageSink,
    now_ms: u64,
) {
    for strategy in strategies.iter_mut() {
        if !strategy.is_subscribed(stream_id) || !strategy.check_market_book(market) {
            continue;
        }
        let mut ctx = StrategyContext::new(market, env, sink, strategy.strategy_id(), now_ms);
        strategy.process_market_book(&mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, StrategyLimits, TransactionConfig};
    use crate::core::OrderStatus;
    use crate::data::MarketBookBuilder;
    use crate::execution::CollectingSink;
    use rust_decimal_macros::dec;

    struct BackFavourite {
        streams: Vec<StreamId>,
        placed: Vec<OrderId>,
    }

    impl Strategy for BackFavourite {
        fn name(&self) -> &str {
            "back_favourite"
        }

        fn stream_ids(&self) -> &[StreamId] {
            &self.streams
        }

        fn process_market_book(&mut self, ctx: &mut StrategyContext<'_>) {
            if let Ok(id) = ctx.place_order(SelectionKey::selection(1), Side::Back, OrderType::limit(dec!(2.0), dec!(5))) {
                self.placed.push(id);
            }
        }
    }

    #[test]
    fn test_dispatch_only_subscribed() {
        let mut market = Market::new(MarketBookBuilder::new("1.1").version(4).runner(1, |r| r).build());
        let mut env = TradingEnv::new(ClientConfig::default(), TransactionConfig::default(), StrategyLimits::default());
        let mut sink = CollectingSink::default();
        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(BackFavourite {
                streams: vec![StreamId::new("a")],
                placed: Vec::new(),
            }),
            Box::new(BackFavourite {
                streams: vec![StreamId::new("b")],
                placed: Vec::new(),
            }),
        ];
        dispatch_book(&mut strategies, &StreamId::new("a"), &mut market, &mut env, &mut sink, 0);

        assert_eq!(sink.packages.len(), 1);
        assert_eq!(sink.packages[0].market_version, Some(4));
        let order = market.orders().next().unwrap();
        assert_eq!(order.strategy, StrategyId::new("back_favourite"));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.submitted);
    }
}
