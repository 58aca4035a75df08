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

//! # Positions — the Global Position Store (GPS)
//!
//! Covers C1 of the specification: the per-strategy transactional position
//! ledger (§4.1), including the strict single-open-transaction invariant,
//! sequential `position_num` numbering, and side-rule P&L accounting.

pub mod error;
pub mod position;
pub mod store;
pub mod time;

pub use error::PositionError;
pub use position::{trade_id, EntryData, ExitData, Position, PositionStatus, Transaction, TransactionStatus};
pub use store::PositionStore;
pub use time::parse_timestamp;
