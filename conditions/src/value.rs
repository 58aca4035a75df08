use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// The dynamically-typed result of evaluating an [`crate::expr::Expr`] (§4.4).
/// `Null` represents a value that could not be resolved — warm-up not complete,
/// no LTP yet, unresolvable offset — which is not an error: leaves treat any
/// `Null` operand as non-satisfying (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Null => write!(f, "null"),
        }
    }
}

/// Converts a `node_variables` snapshot value (stored as JSON in the GPS, §4.1)
/// into an evaluator [`Value`].
pub fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::String(s) => Value::Text(s.clone()),
        _ => Value::Null,
    }
}
