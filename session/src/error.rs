use kite_graph::GraphError;
use kite_scheduler::SchedulerError;
use thiserror::Error;

/// Fatal errors from the session layer (C8, §7): any of these end the
/// session's run loop and flip its [`crate::session::SessionStatus`] to
/// `Error`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize event for persistence: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session `{0}` not found")]
    NotFound(String),
}
