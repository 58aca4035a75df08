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

//! # Scheduler — the Tick Processor / Session Scheduler
//!
//! Covers C7 of the specification (§4.7): second-batching of incoming ticks,
//! one strategy-graph traversal per completed bucket, and cooperative pacing
//! between buckets in live-simulation mode.

pub mod bucket;
pub mod error;
pub mod scheduler;

pub use bucket::bucket_of;
pub use error::SchedulerError;
pub use scheduler::{BucketResult, Progress, TickScheduler};
