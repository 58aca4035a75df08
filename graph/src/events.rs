use chrono::{DateTime, Utc};
use kite_conditions::ConditionDiagnostic;
use kite_execution::OrderStatus;
use kite_instrument::Side;
use rust_decimal::Decimal;
use serde::Serialize;

/// Structured per-execution snapshot (C9, §4.9): shape varies by node kind.
/// `Serialize` so the session layer (C8) can write it verbatim into
/// `node_events.jsonl` and the per-emission snapshot (§4.8).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationData {
    Start {
        resolved_symbol: Option<String>,
        end_condition_triggered: Option<String>,
    },
    Signal {
        condition: Option<ConditionDiagnostic>,
        note: Option<String>,
    },
    Order {
        position_id: String,
        symbol: String,
        side: Side,
        quantity: Decimal,
        status: OrderStatus,
        order_id: Option<String>,
        rejection_reason: Option<String>,
    },
    SquareOff {
        reason: String,
        closed_positions: Vec<String>,
    },
}

/// Whether an emitted event represents a node parking on an external dependency
/// or completing its logic for this activation (§4.5 traversal algorithm step 3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pending,
    LogicCompleted,
}

/// An immutable, causally-chained execution record (§3 "Execution Event").
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub execution_id: String,
    pub parent_execution_id: Option<String>,
    pub node_id: String,
    pub node_type: &'static str,
    pub kind: EventKind,
    pub diagnostic: EvaluationData,
    pub timestamp: DateTime<Utc>,
}

/// Result of one node's `on_tick` invocation (§4.5 traversal algorithm step 3).
/// `NotCompleted` updates `NodeRuntime::last_evaluation` only — it is never
/// appended to the session's persisted event history.
pub enum NodeOutcome {
    Pending(EvaluationData),
    LogicCompleted(EvaluationData),
    NotCompleted(EvaluationData),
}
