use chrono::{DateTime, Utc};
use kite_execution::{OrderGateway, OrderGatewayError};
use kite_instrument::ExpiryCalendar;
use kite_market_data::{CandleBuilder, LtpStore};
use kite_positions::PositionStore;
use rust_decimal::Decimal;

/// Backtest vs live-sim vs live (SPEC_FULL §11.5): EntryNode/ExitNode fill
/// behaviour and the scheduler's pacing both branch on this.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SessionMode {
    Backtest,
    LiveSimulation { speed_multiplier: f64 },
    Live,
}

impl SessionMode {
    pub fn is_backtest(self) -> bool {
        matches!(self, SessionMode::Backtest)
    }
}

/// Everything one `StrategyGraph::run_tick` call needs from the outside world
/// (Design Notes §9 `Services` bundle, scoped to a single tick): market-data
/// snapshots, the mutable GPS, the broker adapter, and the expiry calendar.
pub struct TraversalContext<'a> {
    pub tick_time: DateTime<Utc>,
    pub ltp: &'a LtpStore,
    pub candles: &'a CandleBuilder,
    pub positions: &'a mut PositionStore,
    pub gateway: &'a (dyn OrderGateway<Error = OrderGatewayError> + Send + Sync),
    pub calendar: &'a dyn ExpiryCalendar,
    pub mode: SessionMode,
    /// `quantity * multiplier * strategy_scale` multiplier (§4.1); 1 unless the
    /// embedding application scales position sizing across the whole strategy.
    pub strategy_scale: Decimal,
}
