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

//! # Instrument — symbols, contracts, and F&O resolution
//!
//! Defines the concrete and dynamic symbol models used across the Kite engine, and
//! the resolver (§4.6 of the specification) that turns a dynamic F&O symbol such as
//! `NIFTY:W0:ATM:CE` into a concrete contract on a given reference date.

pub mod error;
pub mod fno;
pub mod symbol;

pub use error::FnoError;
pub use fno::{ExpiryCalendar, FnoResolver};
pub use symbol::{
    DynamicSymbol, Exchange, ExpiryKind, InstrumentKind, OptionType, ResolvedContract, Side,
    StrikeSelector,
};
