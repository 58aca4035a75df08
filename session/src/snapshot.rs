use crate::session::SessionStatus;
use crate::trade::{Trade, TradeStatus};
use chrono::{DateTime, Utc};
use kite_graph::ExecutionEvent;
use kite_scheduler::Progress;
use rust_decimal::Decimal;
use serde::Serialize;

/// Aggregate P&L/position counts derived from the accumulated trade set
/// (§4.8 `accumulated.summary`), recomputed on every emission.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionSummary {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub pnl: Decimal,
}

impl SessionSummary {
    pub fn from_trades<'a>(trades: impl Iterator<Item = &'a Trade>) -> Self {
        let mut summary = SessionSummary::default();
        for trade in trades {
            summary.total_trades += 1;
            match trade.status {
                TradeStatus::Closed => {
                    summary.closed_trades += 1;
                    if trade.realized_pnl > Decimal::ZERO {
                        summary.winning_trades += 1;
                    } else if trade.realized_pnl < Decimal::ZERO {
                        summary.losing_trades += 1;
                    }
                }
                TradeStatus::Open | TradeStatus::Partial => summary.open_trades += 1,
            }
            summary.realized_pnl += trade.realized_pnl;
            summary.unrealized_pnl += trade.unrealized_pnl;
            summary.pnl += trade.pnl;
        }
        summary
    }
}

/// The full reconstructable state of a session (§4.8 `accumulated`).
#[derive(Debug, Clone, Serialize)]
pub struct AccumulatedState<'a> {
    pub trades: Vec<&'a Trade>,
    pub events_history: Vec<&'a ExecutionEvent>,
    pub summary: SessionSummary,
}

/// Only what changed since the previous emission (§4.8 `delta`).
#[derive(Debug, Clone, Serialize)]
pub struct DeltaState<'a> {
    pub trades: Vec<&'a Trade>,
    pub events: Vec<&'a ExecutionEvent>,
}

/// One per-emission snapshot pushed to a session's subscribers (§4.8).
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<'a> {
    pub session_id: String,
    pub user_id: String,
    pub strategy_id: String,
    pub status: SessionStatus,
    pub current_time: DateTime<Utc>,
    pub accumulated: AccumulatedState<'a>,
    pub delta: DeltaState<'a>,
    pub progress: Progress,
}

/// Response to the one-shot `GET initial-state` endpoint (§6), driven by the
/// resume protocol (§4.8): events/trades after the client's last-seen ids, or
/// the full accumulated state if the client has none on record.
#[derive(Debug, Clone, Serialize)]
pub struct InitialState<'a> {
    pub events: Vec<&'a ExecutionEvent>,
    pub trades: Vec<&'a Trade>,
    pub is_delta: bool,
    pub last_event_id: Option<String>,
    pub last_trade_id: Option<String>,
    pub event_count: usize,
    pub trade_count: usize,
}

/// Owned counterpart of [`AccumulatedState`], cloned out of a `Session` so it
/// can cross the `mpsc` channel that bridges the scheduler's synchronous
/// per-bucket callback into the async world (§5, §4.8 "event protocol, not
/// the HTTP library").
#[derive(Debug, Clone, Serialize)]
pub struct OwnedAccumulatedState {
    pub trades: Vec<Trade>,
    pub events_history: Vec<ExecutionEvent>,
    pub summary: SessionSummary,
}

/// Owned counterpart of [`DeltaState`].
#[derive(Debug, Clone, Serialize)]
pub struct OwnedDeltaState {
    pub trades: Vec<Trade>,
    pub events: Vec<ExecutionEvent>,
}

/// Owned counterpart of [`Snapshot`], the actual type pushed through the
/// bounded channel a running session streams to (§5).
#[derive(Debug, Clone, Serialize)]
pub struct OwnedSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub strategy_id: String,
    pub status: SessionStatus,
    pub current_time: DateTime<Utc>,
    pub accumulated: OwnedAccumulatedState,
    pub delta: OwnedDeltaState,
    pub progress: Progress,
}

impl From<Snapshot<'_>> for OwnedSnapshot {
    fn from(snapshot: Snapshot<'_>) -> Self {
        Self {
            session_id: snapshot.session_id,
            user_id: snapshot.user_id,
            strategy_id: snapshot.strategy_id,
            status: snapshot.status,
            current_time: snapshot.current_time,
            accumulated: OwnedAccumulatedState {
                trades: snapshot.accumulated.trades.into_iter().cloned().collect(),
                events_history: snapshot.accumulated.events_history.into_iter().cloned().collect(),
                summary: snapshot.accumulated.summary,
            },
            delta: OwnedDeltaState {
                trades: snapshot.delta.trades.into_iter().cloned().collect(),
                events: snapshot.delta.events.into_iter().cloned().collect(),
            },
            progress: snapshot.progress,
        }
    }
}

/// What a session's subscriber channel carries: either a routine per-bucket
/// emission, or the final snapshot sent once the session reaches a terminal
/// status (§4.8, §7) — the sink uses this to know when to stop reading.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Data(OwnedSnapshot),
    Completed(OwnedSnapshot),
}
