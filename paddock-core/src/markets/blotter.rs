//! Per-market order index
//!
//! The blotter never owns orders. It maps ids to `OrderRef` arena keys in
//! the market's `TradeBook` and keeps secondary indexes for the lookups
//! controls and strategies make on every snapshot.

use crate::core::{BetId, ClientId, MarketId, OrderId, PaddockError, PaddockResult, SelectionKey, StrategyId, TradeId};
use crate::order::{Order, OrderRef};
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

#[derive(Debug)]
pub struct Blotter {
    market_id: MarketId,
    refs: HashMap<OrderId, OrderRef>,
    /// Every order, in insertion order
    insertion: Vec<OrderId>,
    by_bet: HashMap<BetId, OrderId>,
    by_trade: HashMap<TradeId, Vec<OrderId>>,
    by_strategy: HashMap<StrategyId, Vec<OrderId>>,
    by_strategy_selection: HashMap<(StrategyId, SelectionKey), Vec<OrderId>>,
    by_client: HashMap<ClientId, Vec<OrderId>>,
    by_client_strategy: HashMap<(ClientId, StrategyId), Vec<OrderId>>,
    /// Orders whose trade has not completed
    live: BTreeSet<OrderId>,
}

impl Blotter {
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            refs: HashMap::new(),
            insertion: Vec::new(),
            by_bet: HashMap::new(),
            by_trade: HashMap::new(),
            by_strategy: HashMap::new(),
            by_strategy_selection: HashMap::new(),
            by_client: HashMap::new(),
            by_client_strategy: HashMap::new(),
            live: BTreeSet::new(),
        }
    }

    pub fn market_id(&self) -> &MarketId {
        &self.market_id
    }

    /// Index a newly created order
    pub fn insert(&mut self, order: &Order, order_ref: OrderRef) -> PaddockResult<()> {
        if self.refs.contains_key(&order.id) {
            return Err(PaddockError::DuplicateOrder(order.id));
        }
        let id = order.id;
        self.refs.insert(id, order_ref);
        self.insertion.push(id);
        if let Some(bet_id) = order.bet_id {
            self.by_bet.insert(bet_id, id);
        }
        self.by_trade.entry(order.trade_id).or_default().push(id);
        self.by_strategy.entry(order.strategy.clone()).or_default().push(id);
        self.by_strategy_selection
            .entry((order.strategy.clone(), order.selection))
            .or_default()
            .push(id);
        self.by_client.entry(order.client.clone()).or_default().push(id);
        self.by_client_strategy
            .entry((order.client.clone(), order.strategy.clone()))
            .or_default()
            .push(id);
        self.live.insert(id);
        trace!(market_id = %self.market_id, order_id = %id, "blotter insert");
        Ok(())
    }

    /// Record the bet id the exchange assigned
    pub fn set_bet_id(&mut self, order_id: OrderId, bet_id: BetId) {
        self.by_bet.insert(bet_id, order_id);
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.refs.contains_key(&order_id)
    }

    pub fn get(&self, order_id: OrderId) -> Option<OrderRef> {
        self.refs.get(&order_id).copied()
    }

    pub fn by_bet_id(&self, bet_id: BetId) -> Option<OrderId> {
        self.by_bet.get(&bet_id).copied()
    }

    pub fn trade_orders(&self, trade_id: TradeId) -> &[OrderId] {
        self.by_trade.get(&trade_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn strategy_orders(&self, strategy: &StrategyId) -> &[OrderId] {
        self.by_strategy.get(strategy).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn strategy_selection_orders(&self, strategy: &StrategyId, selection: SelectionKey) -> &[OrderId] {
        self.by_strategy_selection
            .get(&(strategy.clone(), selection))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn client_orders(&self, client: &ClientId) -> &[OrderId] {
        self.by_client.get(client).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn client_strategy_orders(&self, client: &ClientId, strategy: &StrategyId) -> &[OrderId] {
        self.by_client_strategy
            .get(&(client.clone(), strategy.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every order in insertion order
    pub fn order_ids(&self) -> &[OrderId] {
        &self.insertion
    }

    /// Orders whose trade is still open, in id order
    pub fn live_orders(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.live.iter().copied()
    }

    pub fn is_live(&self, order_id: OrderId) -> bool {
        self.live.contains(&order_id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Drop a completed trade's orders from the live set
    pub fn complete_trade(&mut self, trade_id: TradeId) {
        if let Some(ids) = self.by_trade.get(&trade_id) {
            for id in ids {
                self.live.remove(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Side;
    use crate::order::{OrderType, TradeBook};
    use rust_decimal_macros::dec;

    fn setup() -> (TradeBook, Blotter, TradeId) {
        let mut trades = TradeBook::new(MarketId::new("1.1"));
        let trade_id = trades.open_trade(SelectionKey::selection(1), StrategyId::new("s"), 0);
        (trades, Blotter::new(MarketId::new("1.1")), trade_id)
    }

    #[test]
    fn test_indexes_populated() {
        let (mut trades, mut blotter, trade_id) = setup();
        let r = trades
            .create_order(trade_id, ClientId::new("c"), Side::Back, OrderType::limit(dec!(2), dec!(5)), 0)
            .unwrap();
        let order = trades.get(r).unwrap();
        blotter.insert(order, r).unwrap();

        let strategy = StrategyId::new("s");
        let client = ClientId::new("c");
        assert_eq!(blotter.get(order.id), Some(r));
        assert_eq!(blotter.trade_orders(trade_id), &[order.id]);
        assert_eq!(blotter.strategy_orders(&strategy), &[order.id]);
        assert_eq!(blotter.strategy_selection_orders(&strategy, SelectionKey::selection(1)), &[order.id]);
        assert!(blotter.strategy_selection_orders(&strategy, SelectionKey::selection(2)).is_empty());
        assert_eq!(blotter.client_orders(&client), &[order.id]);
        assert_eq!(blotter.client_strategy_orders(&client, &strategy), &[order.id]);
        assert!(blotter.is_live(order.id));
    }

    #[test]
    fn test_duplicate_rejected() {
        let (mut trades, mut blotter, trade_id) = setup();
        let r = trades
            .create_order(trade_id, ClientId::new("c"), Side::Back, OrderType::limit(dec!(2), dec!(5)), 0)
            .unwrap();
        let order = trades.get(r).unwrap();
        blotter.insert(order, r).unwrap();
        let err = blotter.insert(order, r).unwrap_err();
        assert!(matches!(err, PaddockError::DuplicateOrder(id) if id == order.id));
        assert_eq!(blotter.len(), 1);
    }

    #[test]
    fn test_complete_trade_leaves_history() {
        let (mut trades, mut blotter, trade_id) = setup();
        let r = trades
            .create_order(trade_id, ClientId::new("c"), Side::Lay, OrderType::limit(dec!(3), dec!(5)), 0)
            .unwrap();
        let id = trades.get(r).unwrap().id;
        blotter.insert(trades.get(r).unwrap(), r).unwrap();
        blotter.set_bet_id(id, BetId(9));
        blotter.complete_trade(trade_id);
        assert!(!blotter.is_live(id));
        assert_eq!(blotter.live_count(), 0);
        assert_eq!(blotter.order_ids(), &[id]);
        assert_eq!(blotter.by_bet_id(BetId(9)), Some(id));
    }
}
