use thiserror::Error;

/// Expression/condition evaluator errors (§4.4, §7). Per the error table these
/// are fatal for the session — unlike a missing indicator/LTP value, which is
/// represented as [`crate::value::Value::Null`] and simply makes the enclosing
/// leaf non-satisfying, never an `Err`.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EvalError {
    #[error("division by zero evaluating `{0}`")]
    DivisionByZero(String),

    #[error("arithmetic operator `{op}` requires numeric operands, got `{operand}`")]
    NonNumericOperand { op: String, operand: String },

    #[error("comparison `{op}` requires numeric operands, got `{lhs}` and `{rhs}`")]
    IncomparableTypes { op: String, lhs: String, rhs: String },
}
