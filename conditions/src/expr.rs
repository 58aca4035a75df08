use crate::context::{CandleField, EvalContext};
use crate::error::EvalError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic operator for [`Expr::BinaryOp`] (§4.4).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        };
        write!(f, "{s}")
    }
}

/// A recursive arithmetic expression over indicators, candles, LTP, and node
/// variables (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Ltp {
        symbol: String,
    },
    CandleField {
        symbol: String,
        timeframe_minutes: u32,
        field: CandleField,
        offset: i64,
    },
    Indicator {
        symbol: String,
        timeframe_minutes: u32,
        key: String,
        offset: i64,
    },
    NodeVariable {
        node_id: String,
        name: String,
    },
    UnderlyingLtp,
    BinaryOp {
        left: Box<Expr>,
        op: ArithOp,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(left: Expr, op: ArithOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Evaluates at the current bar (offset shift 0).
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        self.eval_shifted(ctx, 0)
    }

    /// Evaluates with every `candle_field`/`indicator` offset shifted by
    /// `shift` bars — used to resolve the "previous bar" side of
    /// `crosses_above`/`crosses_below` (§4.4) without duplicating the tree.
    pub fn eval_shifted(&self, ctx: &EvalContext<'_>, shift: i64) -> Result<Value, EvalError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Ltp { symbol } => Ok(ctx.ltp(symbol)),
            Expr::UnderlyingLtp => Ok(ctx.underlying_ltp()),
            Expr::CandleField {
                symbol,
                timeframe_minutes,
                field,
                offset,
            } => Ok(ctx.candle_field(symbol, *timeframe_minutes, *field, offset + shift)),
            Expr::Indicator {
                symbol,
                timeframe_minutes,
                key,
                offset,
            } => Ok(ctx.indicator(symbol, *timeframe_minutes, key, offset + shift)),
            Expr::NodeVariable { node_id, name } => Ok(ctx.node_variable(node_id, name)),
            Expr::BinaryOp { left, op, right } => {
                let l = left.eval_shifted(ctx, shift)?;
                let r = right.eval_shifted(ctx, shift)?;
                apply_arith(*op, l, r)
            }
        }
    }
}

fn apply_arith(op: ArithOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    let (l, r) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            let operand = if lhs.as_f64().is_none() {
                lhs.type_name()
            } else {
                rhs.type_name()
            };
            return Err(EvalError::NonNumericOperand {
                op: op.to_string(),
                operand: operand.to_string(),
            });
        }
    };

    match op {
        ArithOp::Add => Ok(Value::Number(l + r)),
        ArithOp::Sub => Ok(Value::Number(l - r)),
        ArithOp::Mul => Ok(Value::Number(l * r)),
        ArithOp::Div if r == 0.0 => Err(EvalError::DivisionByZero(format!("{l} / {r}"))),
        ArithOp::Div => Ok(Value::Number(l / r)),
        ArithOp::Mod if r == 0.0 => Err(EvalError::DivisionByZero(format!("{l} % {r}"))),
        ArithOp::Mod => Ok(Value::Number(l % r)),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Text(s) => write!(f, "{s:?}"),
            Expr::Ltp { symbol } => write!(f, "ltp({symbol})"),
            Expr::UnderlyingLtp => write!(f, "underlying_ltp()"),
            Expr::CandleField {
                symbol,
                timeframe_minutes,
                field,
                offset,
            } => write!(f, "{}({symbol},{timeframe_minutes}m,{offset})", field.as_str()),
            Expr::Indicator {
                symbol,
                timeframe_minutes,
                key,
                offset,
            } => write!(f, "{key}({symbol},{timeframe_minutes}m,{offset})"),
            Expr::NodeVariable { node_id, name } => write!(f, "var({node_id}.{name})"),
            Expr::BinaryOp { left, op, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kite_market_data::{CandleBuilder, IndicatorEngine, IndicatorKind, IndicatorSpec, LtpStore, MarketDataPipeline, Tick};
    use kite_positions::PositionStore;
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn ctx_with_ltp(ltp: &LtpStore, candles: &CandleBuilder, positions: &PositionStore) -> EvalContext<'_> {
        EvalContext::new(ltp, candles, positions, "NIFTY")
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = ctx_with_ltp(&ltp, &candles, &positions);
        let expr = Expr::binary(Expr::Number(1.0), ArithOp::Div, Expr::Number(0.0));
        assert!(matches!(expr.eval(&ctx), Err(EvalError::DivisionByZero(_))));
    }

    #[test]
    fn missing_ltp_is_null_not_error() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = ctx_with_ltp(&ltp, &candles, &positions);
        let expr = Expr::Ltp { symbol: "NIFTY".into() };
        assert_eq!(expr.eval(&ctx).unwrap(), Value::Null);
    }

    #[test]
    fn candle_field_reads_completed_history() {
        let ltp = LtpStore::new();
        let mut candles = CandleBuilder::new(10);
        candles.register("NIFTY", 1);
        let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        candles.on_tick(&Tick::new(base, "NIFTY", dec!(100), dec!(1)));
        candles.on_tick(&Tick::new(base + chrono::Duration::minutes(1), "NIFTY", dec!(105), dec!(1)));
        let positions = PositionStore::new();
        let ctx = ctx_with_ltp(&ltp, &candles, &positions);

        let expr = Expr::CandleField {
            symbol: "NIFTY".into(),
            timeframe_minutes: 1,
            field: CandleField::Close,
            offset: 0,
        };
        assert_eq!(expr.eval(&ctx).unwrap(), Value::Number(100.0));
    }

    #[test]
    fn indicator_reads_value_from_completed_history() {
        let mut candles = CandleBuilder::new(10);
        candles.register("NIFTY", 1);
        let mut indicators = IndicatorEngine::new();
        indicators.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "sma2".into(),
            kind: IndicatorKind::Sma,
            period: 2,
        });
        let mut pipeline = MarketDataPipeline::new(candles, indicators);

        let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        pipeline.on_tick(&Tick::new(base, "NIFTY", dec!(100), dec!(1)));
        pipeline.on_tick(&Tick::new(base + chrono::Duration::minutes(1), "NIFTY", dec!(200), dec!(1)));
        pipeline.on_tick(&Tick::new(base + chrono::Duration::minutes(2), "NIFTY", dec!(300), dec!(1)));

        // Read the indicator back through the same path a node's condition
        // tree uses — completed history, not the value `on_tick` returned.
        let positions = PositionStore::new();
        let ctx = EvalContext::new(&pipeline.ltp, &pipeline.candles, &positions, "NIFTY");
        let expr = Expr::Indicator {
            symbol: "NIFTY".into(),
            timeframe_minutes: 1,
            key: "sma2".into(),
            offset: 0,
        };
        assert_eq!(expr.eval(&ctx).unwrap(), Value::Number(150.0));
    }

    #[test]
    fn non_numeric_operand_is_an_error() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = ctx_with_ltp(&ltp, &candles, &positions);
        let expr = Expr::binary(Expr::Text("abc".into()), ArithOp::Add, Expr::Number(1.0));
        assert!(matches!(expr.eval(&ctx), Err(EvalError::NonNumericOperand { .. })));
    }
}
