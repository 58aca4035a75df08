//! End-to-end coverage of the end-of-day square-off: once `startNode`'s
//! `endConditions.timeBasedExit` fires, every open position is flattened at
//! its last known LTP and the graph is marked ended, idempotently.

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
                "endConditions": {"timeBasedExit": {"enabled": true, "exitTime": "15:20:00"}},
            }},
            {"id": "entry-signal", "type": "entrySignalNode", "data": {
                "conditions": {"type": "leaf", "lhs": {"type": "ltp", "symbol": "X"}, "op": ">", "rhs": {"type": "number", "value": 100}},
            }},
            {"id": "entry", "type": "entryNode", "data": {
                "instrument": "X",
                "positions": [{"id": "leg-1", "vpi": "pos-1", "quantity": 1, "multiplier": 1, "positionType": "buy", "maxEntries": 1}],
            }},
            {"id": "square-off", "type": "squareOffNode", "data": {}},
        ],
        "edges": [
            {"source": "start", "target": "entry-signal"},
            {"source": "start", "target": "square-off"},
            {"source": "entry-signal", "target": "entry"},
        ],
    });
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn square_off_flattens_every_open_position_once_past_exit_time() {
    let graph = StrategyGraph::from_spec(&spec()).unwrap();
    let gateway = BacktestGateway::new();
    let calendar = NoExpiry;
    let mut positions = PositionStore::new();
    let mut pipeline = MarketDataPipeline::default();
    graph.register_market_data(&mut pipeline);

    let day = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap().date_naive();
    let ticks = [
        (Utc.from_utc_datetime(&day.and_hms_opt(9, 16, 0).unwrap()), dec!(101)),
        (Utc.from_utc_datetime(&day.and_hms_opt(15, 20, 1).unwrap()), dec!(108)),
    ];

    for (tick_time, price) in ticks {
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

    assert!(graph.has_ended());
    assert!(graph.square_off_done());
    assert!(!positions.has_open_position("pos-1"));
    let closed = positions.get_closed_positions();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_price, Some(dec!(108)));
    assert_eq!(closed[0].close_reason.as_deref(), Some("square_off"));

    // A further tick must not liquidate a second time.
    let tick_time = Utc.from_utc_datetime(&day.and_hms_opt(15, 21, 0).unwrap());
    let tick = Tick::new(tick_time, "X", dec!(110), dec!(1));
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
    assert_eq!(positions.get_closed_positions().len(), 1);
}
