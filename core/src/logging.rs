//! Structured logging setup for the Kite engine (§10.2 Ambient Stack).
//!
//! A session's `tracing::Span` (keyed by `session_id`) is opened by the
//! supervisor, not here — this module only wires the global subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Human-readable logging, `RUST_LOG`-configurable, `info` by default.
///
/// ```no_run
/// kite_core::logging::init_logging();
/// tracing::info!("engine started");
/// ```
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// JSON logging, for ingestion by a log aggregator.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}
