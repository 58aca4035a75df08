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

//! # Session — session registry, event/trade stream, and persistence
//!
//! Covers C8 and C9 of the specification: session lifecycle (§4.8), the
//! accumulated/delta event and trade model, on-disk JSONL persistence and
//! resume protocol (§6), and the diagnostics that ride along on every
//! [`kite_graph::ExecutionEvent`] (§4.9 — the per-execution `evaluation_data`
//! itself is captured where it is produced, in `kite_graph::events`; this
//! crate is the layer that persists and streams it).

pub mod error;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod trade;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{derive_session_id, Session, SessionStatus};
pub use snapshot::{
    AccumulatedState, DeltaState, InitialState, OwnedAccumulatedState, OwnedDeltaState, OwnedSnapshot, SessionSummary, Snapshot,
    StreamEvent,
};
pub use trade::{Trade, TradeStatus};
