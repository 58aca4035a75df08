use kite_conditions::EvalError;
use kite_execution::OrderGatewayError;
use kite_instrument::FnoError;
use kite_positions::PositionError;
use thiserror::Error;

/// Fatal errors from the strategy graph (§7): all of these abort the current
/// tick and end the session with `status=error`.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("malformed strategy JSON: {0}")]
    MalformedSpec(String),

    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("edge references unknown node `{0}`")]
    UnknownNodeReference(String),

    #[error("node `{node_id}` variable `{name}` references itself")]
    SelfReferentialVariable { node_id: String, name: String },

    #[error("node `{node_id}` variables form a cycle: {cycle}")]
    VariableCycle { node_id: String, cycle: String },

    #[error("F&O resolution failed: {0}")]
    FnoResolution(#[from] FnoError),

    #[error("condition/expression evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("GPS error: {0}")]
    Position(#[from] PositionError),

    #[error("order gateway error: {0}")]
    Gateway(#[from] OrderGatewayError),
}
