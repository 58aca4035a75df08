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

//! # Core — the Kite engine facade
//!
//! Ties the rest of the workspace into a runnable session (§10.1 Ambient
//! Stack): [`services::Services`] bundles the external collaborators a
//! session needs (broker gateway, expiry calendar, clock), [`config`] holds
//! the embedder-supplied per-session knobs, [`supervisor::run_session`] drives
//! one session end to end over [`kite_graph`]/[`kite_scheduler`]/
//! [`kite_session`], [`stream`] is the bounded channel a session's
//! subscribers read from, [`shutdown`] is the cooperative cancellation token,
//! and [`logging`] wires `tracing`. [`error::KiteError`] aggregates every
//! fatal error kind from the crates below it (§7).

pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod shutdown;
pub mod stream;
pub mod supervisor;

pub use config::{DropPolicy, SessionConfig};
pub use error::KiteError;
pub use services::{Clock, Services, ServicesBuilder, SystemClock};
pub use shutdown::Cancel;
pub use stream::{bounded, StreamReceiver, StreamSender};
pub use supervisor::run_session;
