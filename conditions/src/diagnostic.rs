use crate::condition::{CompareOp, Logical};
use crate::value::Value;
use serde::Serialize;

/// Diagnostic snapshot of one leaf evaluation, recorded for the event stream's
/// diagnostics recorder (§4.4, §4.9): the evaluated operand values, the
/// operator, whether it was satisfied, and a human-readable expression preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafDiagnostic {
    pub lhs_value: Value,
    pub rhs_value: Value,
    /// Present only for `crosses_above`/`crosses_below`: the previous-bar values
    /// used alongside the current-bar values above.
    pub previous_lhs_value: Option<Value>,
    pub previous_rhs_value: Option<Value>,
    pub operator: CompareOp,
    pub satisfied: bool,
    pub preview: String,
}

/// Diagnostic tree mirroring the shape of the evaluated [`crate::condition::Condition`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionDiagnostic {
    Leaf(LeafDiagnostic),
    Group {
        logical: Logical,
        satisfied: bool,
        children: Vec<ConditionDiagnostic>,
    },
}

impl ConditionDiagnostic {
    pub fn satisfied(&self) -> bool {
        match self {
            ConditionDiagnostic::Leaf(leaf) => leaf.satisfied,
            ConditionDiagnostic::Group { satisfied, .. } => *satisfied,
        }
    }
}

/// Result of evaluating a [`crate::condition::Condition`] (§4.4): whether it was
/// satisfied plus the diagnostic tree behind that verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub satisfied: bool,
    pub diagnostic: ConditionDiagnostic,
}
