//! End-to-end coverage of the re-entry limit boundary case: an EntryNode leg
//! with `maxEntries = 2`, gated by a standalone ReEntrySignalNode (distinct
//! from the EntrySignalNode's own optional `reEntryConditions`) for the second
//! cycle, hits its cap and permanently deactivates rather than opening a
//! third position.

use chrono::{TimeZone, Utc};
use kite_execution::BacktestGateway;
use kite_graph::{SessionMode, StrategyGraph, StrategySpec, TraversalContext};
use kite_instrument::{ExpiryCalendar, ExpiryKind};
use kite_market_data::{MarketDataPipeline, Tick};
use kite_positions::PositionStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

struct NoExpiry;
impl ExpiryCalendar for NoExpiry {
    fn nth_expiry(&self, _: &str, _: ExpiryKind, _: u32, _: chrono::NaiveDate) -> Option<chrono::NaiveDate> {
        None
    }
    fn strike_step(&self, _: &str) -> Option<Decimal> {
        None
    }
}

fn spec() -> StrategySpec {
    let json = json!({
        "nodes": [
            {"id": "start", "type": "startNode", "data": {
                "tradingInstrumentConfig": {"symbol": "X", "timeframes": []},
                "tradingInstrument": {"type": "equity"},
            }},
            {"id": "entry-signal", "type": "entrySignalNode", "data": {
                "conditions": {"type": "leaf", "lhs": {"type": "ltp", "symbol": "X"}, "op": ">", "rhs": {"type": "number", "value": 100}},
                "reEntryConditions": {"type": "leaf", "lhs": {"type": "number", "value": 0}, "op": ">", "rhs": {"type": "number", "value": 1}},
                "targetPositionVpi": "pos-1",
            }},
            {"id": "re-entry", "type": "reEntrySignalNode", "data": {
                "conditions": {"type": "leaf", "lhs": {"type": "number", "value": 1}, "op": ">", "rhs": {"type": "number", "value": 0}},
                "targetPositionVpi": "pos-1",
            }},
            {"id": "entry", "type": "entryNode", "data": {
                "instrument": "X",
                "positions": [{"id": "leg-1", "vpi": "pos-1", "quantity": 1, "multiplier": 1, "positionType": "buy", "maxEntries": 2}],
            }},
            {"id": "exit-signal", "type": "exitSignalNode", "data": {
                "conditions": {"type": "leaf", "lhs": {"type": "ltp", "symbol": "X"}, "op": "<", "rhs": {"type": "number", "value": 95}},
                "targetPositionVpi": "pos-1",
            }},
            {"id": "exit", "type": "exitNode", "data": {
                "exitConfig": {"targetPositionVpi": "pos-1"},
            }},
        ],
        "edges": [
            {"source": "start", "target": "entry-signal"},
            {"source": "start", "target": "re-entry"},
            {"source": "start", "target": "exit-signal"},
            {"source": "entry-signal", "target": "entry"},
            {"source": "re-entry", "target": "entry"},
            {"source": "exit-signal", "target": "exit"},
        ],
    });
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn reentry_node_permanently_deactivates_once_max_entries_is_reached() {
    let graph = StrategyGraph::from_spec(&spec()).unwrap();
    let gateway = BacktestGateway::new();
    let calendar = NoExpiry;
    let mut positions = PositionStore::new();
    let mut pipeline = MarketDataPipeline::default();
    graph.register_market_data(&mut pipeline);

    let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
    // price, minutes offset
    let ticks = [
        (dec!(101), 0), // cycle 1 opens (position_num = 1)
        (dec!(90), 1),  // cycle 1 closes
        (dec!(101), 2), // cycle 2 opens via re-entry (position_num = 2)
        (dec!(90), 3),  // cycle 2 closes
        (dec!(101), 4), // third attempt: max entries reached, no position opened
    ];

    for (price, minute) in ticks {
        let tick_time = base + chrono::Duration::minutes(minute);
        let tick = Tick::new(tick_time, "X", price, dec!(1));
        pipeline.on_tick(&tick);
        let mut ctx = TraversalContext {
            tick_time,
            ltp: &pipeline.ltp,
            candles: &pipeline.candles,
            positions: &mut positions,
            gateway: &gateway,
            calendar: &calendar,
            mode: SessionMode::Backtest,
            strategy_scale: Decimal::ONE,
        };
        graph.run_tick(&mut ctx).await.unwrap();
    }

    assert_eq!(positions.get_latest_position_num("pos-1"), 2);
    assert!(!positions.has_open_position("pos-1"));

    let re_entry_node = graph.node("re-entry").unwrap();
    assert!(re_entry_node.runtime.borrow().permanently_inactive);
}
