use crate::context::EvalContext;
use crate::diagnostic::{ConditionDiagnostic, EvalOutcome, LeafDiagnostic};
use crate::error::EvalError;
use crate::expr::Expr;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf comparison operator (§4.4).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    CrossesAbove,
    CrossesBelow,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::CrossesAbove => "crosses_above",
            CompareOp::CrossesBelow => "crosses_below",
        };
        write!(f, "{s}")
    }
}

/// Boolean combinator for [`Condition::Group`] (§4.4).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logical {
    And,
    Or,
}

/// A condition tree (§4.4): a leaf comparing two expressions, or a logical
/// group of child conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf {
        lhs: Expr,
        op: CompareOp,
        rhs: Expr,
    },
    Group {
        logical: Logical,
        children: Vec<Condition>,
    },
}

impl Condition {
    pub fn leaf(lhs: Expr, op: CompareOp, rhs: Expr) -> Self {
        Condition::Leaf { lhs, op, rhs }
    }

    pub fn group(logical: Logical, children: Vec<Condition>) -> Self {
        Condition::Group { logical, children }
    }

    /// Evaluates the tree against `ctx` (§4.4). Returns `Err` only for the
    /// fatal evaluator errors of §7 (division by zero, non-numeric arithmetic
    /// operands, incomparable types); a leaf with any `Null` operand is simply
    /// non-satisfying.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<EvalOutcome, EvalError> {
        match self {
            Condition::Leaf { lhs, op, rhs } => eval_leaf(lhs, *op, rhs, ctx),
            Condition::Group { logical, children } => {
                let mut child_outcomes = Vec::with_capacity(children.len());
                for child in children {
                    child_outcomes.push(child.eval(ctx)?);
                }
                let satisfied = match logical {
                    Logical::And => child_outcomes.iter().all(|o| o.satisfied),
                    Logical::Or => child_outcomes.iter().any(|o| o.satisfied),
                };
                Ok(EvalOutcome {
                    satisfied,
                    diagnostic: ConditionDiagnostic::Group {
                        logical: *logical,
                        satisfied,
                        children: child_outcomes.into_iter().map(|o| o.diagnostic).collect(),
                    },
                })
            }
        }
    }
}

fn eval_leaf(lhs: &Expr, op: CompareOp, rhs: &Expr, ctx: &EvalContext<'_>) -> Result<EvalOutcome, EvalError> {
    let preview = format!("{lhs} {op} {rhs}");

    match op {
        CompareOp::CrossesAbove | CompareOp::CrossesBelow => {
            let current_lhs = lhs.eval_shifted(ctx, 0)?;
            let current_rhs = rhs.eval_shifted(ctx, 0)?;
            let previous_lhs = lhs.eval_shifted(ctx, -1)?;
            let previous_rhs = rhs.eval_shifted(ctx, -1)?;

            let satisfied = match (
                current_lhs.as_f64(),
                current_rhs.as_f64(),
                previous_lhs.as_f64(),
                previous_rhs.as_f64(),
            ) {
                (Some(cl), Some(cr), Some(pl), Some(pr)) => match op {
                    CompareOp::CrossesAbove => pl <= pr && cl > cr,
                    CompareOp::CrossesBelow => pl >= pr && cl < cr,
                    _ => unreachable!(),
                },
                _ => false,
            };

            Ok(EvalOutcome {
                satisfied,
                diagnostic: ConditionDiagnostic::Leaf(LeafDiagnostic {
                    lhs_value: current_lhs,
                    rhs_value: current_rhs,
                    previous_lhs_value: Some(previous_lhs),
                    previous_rhs_value: Some(previous_rhs),
                    operator: op,
                    satisfied,
                    preview,
                }),
            })
        }
        _ => {
            let lhs_value = lhs.eval(ctx)?;
            let rhs_value = rhs.eval(ctx)?;
            let satisfied = compare(op, &lhs_value, &rhs_value)?;
            Ok(EvalOutcome {
                satisfied,
                diagnostic: ConditionDiagnostic::Leaf(LeafDiagnostic {
                    lhs_value,
                    rhs_value,
                    previous_lhs_value: None,
                    previous_rhs_value: None,
                    operator: op,
                    satisfied,
                    preview,
                }),
            })
        }
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(false);
    }

    match op {
        CompareOp::Eq => return Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => return Ok(!values_equal(lhs, rhs)),
        _ => {}
    }

    let (l, r) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(EvalError::IncomparableTypes {
                op: op.to_string(),
                lhs: lhs.type_name().to_string(),
                rhs: rhs.type_name().to_string(),
            })
        }
    };

    Ok(match op {
        CompareOp::Gt => l > r,
        CompareOp::Lt => l < r,
        CompareOp::Ge => l >= r,
        CompareOp::Le => l <= r,
        CompareOp::Eq | CompareOp::Ne | CompareOp::CrossesAbove | CompareOp::CrossesBelow => unreachable!(),
    })
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::Text(l), Value::Text(r)) => l == r,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CandleField;
    use chrono::{TimeZone, Utc};
    use kite_market_data::{CandleBuilder, LtpStore, Tick};
    use kite_positions::PositionStore;
    use rust_decimal_macros::dec;

    #[test]
    fn leaf_with_null_operand_is_non_satisfying() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = EvalContext::new(&ltp, &candles, &positions, "NIFTY");

        let condition = Condition::leaf(Expr::Ltp { symbol: "NIFTY".into() }, CompareOp::Gt, Expr::Number(100.0));
        let outcome = condition.eval(&ctx).unwrap();
        assert!(!outcome.satisfied);
    }

    #[test]
    fn and_group_requires_all_children() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = EvalContext::new(&ltp, &candles, &positions, "NIFTY");

        let group = Condition::group(
            Logical::And,
            vec![
                Condition::leaf(Expr::Number(1.0), CompareOp::Lt, Expr::Number(2.0)),
                Condition::leaf(Expr::Number(5.0), CompareOp::Lt, Expr::Number(2.0)),
            ],
        );
        assert!(!group.eval(&ctx).unwrap().satisfied);
    }

    #[test]
    fn crosses_above_detects_bar_over_bar_flip() {
        let ltp = LtpStore::new();
        let mut candles = CandleBuilder::new(10);
        candles.register("NIFTY", 1);
        let positions = PositionStore::new();
        let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        // close=95 (below 100), then close=105 (above 100): crosses_above fires on
        // the tick that completes the third candle, comparing the two closed bars.
        candles.on_tick(&Tick::new(base, "NIFTY", dec!(95), dec!(1)));
        candles.on_tick(&Tick::new(base + chrono::Duration::minutes(1), "NIFTY", dec!(105), dec!(1)));
        candles.on_tick(&Tick::new(base + chrono::Duration::minutes(2), "NIFTY", dec!(110), dec!(1)));

        let ctx = EvalContext::new(&ltp, &candles, &positions, "NIFTY");
        let condition = Condition::leaf(
            Expr::CandleField {
                symbol: "NIFTY".into(),
                timeframe_minutes: 1,
                field: CandleField::Close,
                offset: 0,
            },
            CompareOp::CrossesAbove,
            Expr::Number(100.0),
        );
        assert!(condition.eval(&ctx).unwrap().satisfied);
    }

    #[test]
    fn incomparable_types_is_an_error() {
        let ltp = LtpStore::new();
        let candles = CandleBuilder::new(10);
        let positions = PositionStore::new();
        let ctx = EvalContext::new(&ltp, &candles, &positions, "NIFTY");
        let condition = Condition::leaf(Expr::Text("abc".into()), CompareOp::Gt, Expr::Number(1.0));
        assert!(matches!(condition.eval(&ctx), Err(EvalError::IncomparableTypes { .. })));
    }
}
