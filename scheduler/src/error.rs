use kite_graph::GraphError;
use thiserror::Error;

/// Fatal errors from the Tick Processor / Session Scheduler (C7, §4.7). A
/// `TickSource` error is stringified at the boundary since the trait's
/// associated `Error` type is not otherwise constrained.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("tick source error: {0}")]
    TickSource(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
