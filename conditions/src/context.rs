use crate::value::{json_to_value, Value};
use kite_market_data::{CandleBuilder, LtpStore};
use kite_positions::PositionStore;
use rust_decimal::prelude::ToPrimitive;

/// Candle OHLCV field an expression can reference (§4.4).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CandleField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl CandleField {
    pub fn as_str(self) -> &'static str {
        match self {
            CandleField::Open => "open",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Close => "close",
            CandleField::Volume => "volume",
        }
    }
}

/// Read-only view over the market-data and position state an [`crate::expr::Expr`]
/// may reference (§4.4): LTP store, candle history (for `candle_field` and
/// `indicator`, both resolved from completed candles), node variables (from the
/// GPS), and the strategy's primary ("underlying") symbol for `underlying_ltp`.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub ltp: &'a LtpStore,
    pub candles: &'a CandleBuilder,
    pub positions: &'a PositionStore,
    pub underlying_symbol: &'a str,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        ltp: &'a LtpStore,
        candles: &'a CandleBuilder,
        positions: &'a PositionStore,
        underlying_symbol: &'a str,
    ) -> Self {
        Self {
            ltp,
            candles,
            positions,
            underlying_symbol,
        }
    }

    pub fn ltp(&self, symbol: &str) -> Value {
        self.ltp
            .ltp(symbol)
            .and_then(|d| d.to_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    pub fn underlying_ltp(&self) -> Value {
        self.ltp(self.underlying_symbol)
    }

    /// `offset <= 0`: 0 is the most recently *completed* candle, -1 the one
    /// before it, and so on (§4.4). Both `candle_field` and `indicator` read
    /// from completed-candle history since indicator values are only written
    /// into a candle once it completes (§4.3).
    pub fn candle_field(&self, symbol: &str, timeframe_minutes: u32, field: CandleField, offset: i64) -> Value {
        let Ok(back) = usize::try_from(-offset) else {
            return Value::Null;
        };
        let Some(candle) = self.candles.completed_offset(symbol, timeframe_minutes, back) else {
            return Value::Null;
        };
        let raw = match field {
            CandleField::Open => candle.open,
            CandleField::High => candle.high,
            CandleField::Low => candle.low,
            CandleField::Close => candle.close,
            CandleField::Volume => candle.volume,
        };
        raw.to_f64().map(Value::Number).unwrap_or(Value::Null)
    }

    pub fn indicator(&self, symbol: &str, timeframe_minutes: u32, key: &str, offset: i64) -> Value {
        let Ok(back) = usize::try_from(-offset) else {
            return Value::Null;
        };
        let Some(candle) = self.candles.completed_offset(symbol, timeframe_minutes, back) else {
            return Value::Null;
        };
        match candle.indicators.get(key) {
            Some(Some(v)) => Value::Number(*v),
            _ => Value::Null,
        }
    }

    pub fn node_variable(&self, node_id: &str, name: &str) -> Value {
        self.positions
            .get_node_variable(node_id, name)
            .map(json_to_value)
            .unwrap_or(Value::Null)
    }
}
