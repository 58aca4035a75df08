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

//! # Market Data — tick ingestion, candles, and indicators
//!
//! Covers C2 (Candle Builder) and C3 (Indicator Engine) of the specification, plus
//! the `Tick`/`TickSource`/LTP store data model of §3 that both depend on.

pub mod candle;
pub mod indicator;
pub mod ltp;
pub mod pipeline;
pub mod tick;

pub use candle::{Candle, CandleBuilder};
pub use indicator::{IndicatorEngine, IndicatorKind, IndicatorSpec};
pub use ltp::{LtpEntry, LtpStore};
pub use pipeline::{MarketDataPipeline, PipelineUpdate};
pub use tick::{Tick, TickSource, VecTickSource};
