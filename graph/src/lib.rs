#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Graph — the strategy execution graph
//!
//! Covers C5 and C6 of the specification: the strategy JSON model (§6), the
//! node catalogue (§4.5), and the per-tick traversal driver that walks the
//! graph from `startNode` down, dispatching each visited node to its
//! `on_tick` implementation and recording the resulting execution events (§3,
//! §4.9).

pub mod context;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod nodes;
pub mod runtime;
pub(crate) mod variables;

pub use context::{SessionMode, TraversalContext};
pub use error::GraphError;
pub use events::{EvaluationData, EventKind, ExecutionEvent, NodeOutcome};
pub use graph::{NodeInstance, StrategyGraph};
pub use model::{NodeConfig, StrategySpec};
pub use runtime::{NodeRuntime, NodeStatus, PendingOrderState};
