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

//! # Execution — the `OrderGateway` contract
//!
//! The broker adapter is out of scope (§1): this crate specifies only the
//! narrow contract (§6) the strategy graph's `EntryNode`/`ExitNode` consume, plus
//! two reference implementations used in backtests and tests —
//! [`BacktestGateway`] (instant fill) and [`SimGateway`] (pending + manual
//! postback, for exercising the live-mode polling loop deterministically).

pub mod backtest;
pub mod error;
pub mod gateway;
pub mod order;
pub mod sim;

pub use backtest::BacktestGateway;
pub use error::OrderGatewayError;
pub use gateway::OrderGateway;
pub use order::{
    CancelResult, OrderAck, OrderRequest, OrderStatus, OrderStatusSnapshot, OrderType, ProductType,
};
pub use sim::SimGateway;
