use kite_graph::GraphError;
use kite_scheduler::SchedulerError;
use kite_session::SessionError;
use thiserror::Error;

/// The engine-wide aggregate error (§7): every fatal error produced anywhere
/// in the stack surfaces here, since a fatal error always ends a session and
/// the supervisor is the one place that owns the session's lifecycle.
///
/// There is no `is_fatal` classification on this type: per §7's error table,
/// every variant that reaches `KiteError` is already fatal by construction —
/// the recoverable cases (stale LTP, a rejected order, a GPS no-op close) are
/// absorbed lower down and never converted into an `Err` here.
#[derive(Debug, Error)]
pub enum KiteError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("services misconfigured: {0}")]
    Builder(String),
}
