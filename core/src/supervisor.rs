//! The facade entry point: wires [`kite_graph::StrategyGraph`],
//! [`kite_scheduler::TickScheduler`] and [`kite_session::Session`] into one
//! runnable session (§4.7 + §4.8 end-to-end) — the integration this crate
//! exists to provide.
//!
//! [`run_session`]'s future borrows `graph` for its whole lifetime and is not
//! `Send` (the graph's per-tick traversal uses `RefCell`/`Cell` and a
//! `LocalBoxFuture`, per Design Notes §9's cycle-guard recipe and the
//! recursive-descent traversal in `kite_graph::graph`). Run it inside a
//! `tokio::task::LocalSet` on a dedicated worker, matching §5's "a session is
//! pinned to one worker for its lifetime" — do not `tokio::spawn` it directly
//! on a multi-threaded runtime.

use crate::config::SessionConfig;
use crate::error::KiteError;
use crate::services::Services;
use crate::shutdown::Cancel;
use crate::stream::StreamSender;
use chrono::NaiveDate;
use kite_graph::{SessionMode, StrategyGraph};
use kite_market_data::TickSource;
use kite_scheduler::{Progress, TickScheduler};
use kite_session::{Session, StreamEvent};
use rust_decimal::Decimal;

/// Runs one strategy session to completion: drains `source` bucket by bucket
/// (§4.7), persists/derives trades for each bucket into the session (§4.8),
/// and pushes a snapshot to `stream` whenever `config.clamped_emission_interval()`
/// has elapsed since the last one — immediately for the very first bucket, so
/// a subscriber doesn't wait a full interval to see anything. `cancel` is
/// polled between buckets (§5); a cancellation leaves the session `Stopped`
/// rather than `Completed`.
///
/// `total_ticks`, if known up front (e.g. the length of a pre-loaded backtest
/// `VecTickSource`), enables `Progress::percentage` on emitted snapshots.
///
/// Returns the finished [`Session`] whenever one was successfully started,
/// even after a mid-run fatal error — §7: "partial effects on GPS already
/// committed are visible and final". The session's own
/// [`Session::status`]/[`Session::error_reason`] report whether the run
/// completed, was cancelled, or errored; `Err` is reserved for the one case
/// with no session to report on at all: `Session::start` itself failing
/// (§7: "Session fails to start"), which aborts before anything is
/// persisted.
#[allow(clippy::too_many_arguments)]
pub async fn run_session<T>(
    graph: &StrategyGraph,
    services: &Services,
    config: &SessionConfig,
    mode: SessionMode,
    strategy_scale: Decimal,
    mut source: T,
    total_ticks: Option<u64>,
    user_id: &str,
    strategy_id: &str,
    date: NaiveDate,
    cancel: Cancel,
    stream: StreamSender,
) -> Result<Session, KiteError>
where
    T: TickSource,
    T::Error: std::fmt::Display,
{
    let now = services.clock.now();
    let mut session = match Session::start(&config.persistence_root, user_id, strategy_id, date, now) {
        Ok(session) => session,
        Err(err) => {
            stream.close();
            return Err(KiteError::Session(err));
        }
    };

    let mut scheduler = TickScheduler::new(graph, services.gateway.as_ref(), services.calendar.as_ref(), mode, strategy_scale);
    if let Some(total) = total_ticks {
        scheduler = scheduler.with_total_ticks(total);
    }

    let emission_interval = config.clamped_emission_interval();
    let mut last_emission = now;
    let mut first_emission = true;
    let mut ticks_processed: u64 = 0;

    let run_result = scheduler
        .run_cancellable(
            &mut source,
            |bucket, positions| {
                ticks_processed += bucket.ticks_in_bucket;

                if let Err(err) = session.ingest_bucket(bucket.tick_time, bucket.events, positions) {
                    tracing::error!(error = %err, "failed to persist session bucket");
                }

                let elapsed = bucket
                    .tick_time
                    .signed_duration_since(last_emission)
                    .to_std()
                    .unwrap_or_default();
                if first_emission || elapsed >= emission_interval {
                    first_emission = false;
                    last_emission = bucket.tick_time;
                    let progress = Progress {
                        current_tick: ticks_processed,
                        total_ticks,
                        percentage: total_ticks.map(|total| {
                            if total == 0 {
                                100.0
                            } else {
                                (ticks_processed as f64 / total as f64) * 100.0
                            }
                        }),
                    };
                    let snapshot = session.emit_snapshot(progress);
                    stream.push(StreamEvent::Data(snapshot.into()));
                }
            },
            || cancel.is_cancelled(),
        )
        .await;

    match &run_result {
        Ok(()) if cancel.is_cancelled() => session.stop(),
        Ok(()) => session.complete(),
        Err(err) => session.fail(err.to_string()),
    }

    // One final emission carrying the terminal status, so a subscriber sees
    // completion without waiting for the next interval (§4.8 `completed`:
    // "emitted repeatedly as a keep-alive" — the supervisor guarantees the
    // first one; the transport layer is responsible for repeating it).
    let final_progress = Progress {
        current_tick: ticks_processed,
        total_ticks,
        percentage: Some(100.0),
    };
    let final_snapshot = session.emit_snapshot(final_progress);
    stream.push(StreamEvent::Completed(final_snapshot.into()));
    stream.close();

    // A mid-run error is already folded into `session` via `session.fail`
    // above (status + `error_reason`), matching the "partial effects remain
    // visible" contract, so it is not re-raised here.
    Ok(session)
}
