use crate::error::SessionError;
use crate::persistence::{session_dir, EventLogWriter, TradeLogWriter};
use crate::snapshot::{AccumulatedState, DeltaState, InitialState, SessionSummary, Snapshot};
use crate::trade::{trade_from_closed_transaction, Trade, TradeStatus};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use kite_graph::ExecutionEvent;
use kite_positions::{PositionStore, TransactionStatus};
use kite_scheduler::Progress;
use std::path::Path;

/// A session's lifecycle status (§5 "Cancellation & timeouts", §7). Carried on
/// every emitted [`Snapshot`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Stopped,
    Completed,
    Error,
}

/// `user_id + strategy_id + date` (§4.8): deterministic so a disconnecting
/// client can resubscribe to the same session id after reconnecting.
pub fn derive_session_id(user_id: &str, strategy_id: &str, date: NaiveDate) -> String {
    format!("{user_id}:{strategy_id}:{date}")
}

/// The Session & Streaming Layer entity (C8, §4.8): owns the accumulated event
/// history and derived trade set for one strategy run, the delta buffers
/// consumed by the next emission, and the on-disk JSONL writers. Created once
/// per `(user_id, strategy_id, date)` and owned by exactly one scheduling
/// worker for its lifetime (§5).
#[derive(Debug)]
pub struct Session {
    session_id: String,
    user_id: String,
    strategy_id: String,
    status: SessionStatus,
    error_reason: Option<String>,
    current_time: DateTime<Utc>,
    accumulated_events: IndexMap<String, ExecutionEvent>,
    accumulated_trades: IndexMap<String, Trade>,
    last_trade_status: IndexMap<String, TradeStatus>,
    delta_event_ids: Vec<String>,
    delta_trade_ids: Vec<String>,
    event_writer: EventLogWriter,
    trade_writer: TradeLogWriter,
}

impl Session {
    /// Opens (truncating) the session's JSONL files under
    /// `<root>/<date>/<user_id>/<strategy_id>/` (§6) and returns a fresh,
    /// empty session ready to ingest ticks.
    pub fn start(root: &Path, user_id: &str, strategy_id: &str, date: NaiveDate, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let dir = session_dir(root, date, user_id, strategy_id);
        let mut event_writer = EventLogWriter::new(&dir);
        event_writer.open_fresh()?;
        let trade_writer = TradeLogWriter::new(&dir);
        trade_writer.rewrite(&IndexMap::new())?;

        Ok(Self {
            session_id: derive_session_id(user_id, strategy_id, date),
            user_id: user_id.to_string(),
            strategy_id: strategy_id.to_string(),
            status: SessionStatus::Running,
            error_reason: None,
            current_time: now,
            accumulated_events: IndexMap::new(),
            accumulated_trades: IndexMap::new(),
            last_trade_status: IndexMap::new(),
            delta_event_ids: Vec::new(),
            delta_trade_ids: Vec::new(),
            event_writer,
            trade_writer,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn event_count(&self) -> usize {
        self.accumulated_events.len()
    }

    pub fn trade_count(&self) -> usize {
        self.accumulated_trades.len()
    }

    /// Ingests one completed bucket's execution events (§4.7 step 2c) plus the
    /// GPS state as of that bucket: persists every event, derives/upserts the
    /// corresponding trade projections (§4.8 upsert discipline), and advances
    /// `current_time`. Trades are recomputed from every position each bucket
    /// so `accumulated.trades` always reflects live unrealized P&L, but a
    /// trade is only added to the *delta* set (and the on-disk file rewritten)
    /// when its `status` actually changes — a tick that only moves price does
    /// not count as an "update" for the upsert discipline (§4.8).
    pub fn ingest_bucket(
        &mut self,
        tick_time: DateTime<Utc>,
        events: Vec<ExecutionEvent>,
        positions: &PositionStore,
    ) -> Result<(), SessionError> {
        self.current_time = tick_time;

        for event in events {
            self.event_writer.append(&event)?;
            self.delta_event_ids.push(event.execution_id.clone());
            self.accumulated_events.insert(event.execution_id.clone(), event);
        }

        let mut trades_dirty = false;
        for position in positions.get_open_positions().into_iter().chain(positions.get_closed_positions()) {
            for tx in &position.transactions {
                if tx.status != TransactionStatus::Closed {
                    continue;
                }
                let id = kite_positions::trade_id(&position.position_id, tx.position_num);
                if self.accumulated_trades.contains_key(&id) {
                    continue;
                }
                if let Some(trade) = trade_from_closed_transaction(position, tx) {
                    trades_dirty |= self.upsert_trade(trade);
                }
            }

            let live = Trade::from_position(position);
            trades_dirty |= self.upsert_trade(live);
        }

        if trades_dirty {
            self.trade_writer.rewrite(&self.accumulated_trades)?;
        }

        Ok(())
    }

    /// Refreshes `accumulated_trades[trade.trade_id]` unconditionally and
    /// returns whether `trade.status` differs from what was last recorded —
    /// the signal the upsert discipline uses to decide this is a "real" update
    /// (§4.8) rather than a live price refresh.
    fn upsert_trade(&mut self, trade: Trade) -> bool {
        let id = trade.trade_id.clone();
        let status = trade.status;
        let changed = self.last_trade_status.get(&id) != Some(&status);
        self.accumulated_trades.insert(id.clone(), trade);
        if changed {
            self.last_trade_status.insert(id.clone(), status);
            self.delta_trade_ids.push(id);
        }
        changed
    }

    /// Builds one emission snapshot (§4.8) from the accumulated state plus
    /// whatever is in the delta buffers, then drains those buffers — the next
    /// call only reports what changed after this one.
    pub fn emit_snapshot(&mut self, progress: Progress) -> Snapshot<'_> {
        let delta_event_ids = std::mem::take(&mut self.delta_event_ids);
        let delta_trade_ids = std::mem::take(&mut self.delta_trade_ids);

        let events: Vec<&ExecutionEvent> = delta_event_ids.iter().filter_map(|id| self.accumulated_events.get(id)).collect();
        let trades: Vec<&Trade> = delta_trade_ids.iter().filter_map(|id| self.accumulated_trades.get(id)).collect();
        let summary = SessionSummary::from_trades(self.accumulated_trades.values());

        Snapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            strategy_id: self.strategy_id.clone(),
            status: self.status,
            current_time: self.current_time,
            accumulated: AccumulatedState {
                trades: self.accumulated_trades.values().collect(),
                events_history: self.accumulated_events.values().collect(),
                summary,
            },
            delta: DeltaState { trades, events },
            progress,
        }
    }

    /// Resume protocol (§4.8): events/trades strictly after the client's last
    /// seen ids, in insertion order, or the full accumulated state if the id
    /// is absent or not found (a fresh subscriber, or a reconnect after the
    /// in-memory state was evicted). `is_delta` tracks only the event cursor —
    /// the client's primary replay anchor — per §4.8's single-flag contract.
    pub fn resume(&self, last_event_id: Option<&str>, last_trade_id: Option<&str>) -> InitialState<'_> {
        let (events, is_delta) = match last_event_id.and_then(|id| self.accumulated_events.get_index_of(id)) {
            Some(idx) => (self.accumulated_events.values().skip(idx + 1).collect(), true),
            None => (self.accumulated_events.values().collect::<Vec<_>>(), false),
        };
        let trades = match last_trade_id.and_then(|id| self.accumulated_trades.get_index_of(id)) {
            Some(idx) => self.accumulated_trades.values().skip(idx + 1).collect(),
            None => self.accumulated_trades.values().collect::<Vec<_>>(),
        };

        InitialState {
            event_count: events.len(),
            trade_count: trades.len(),
            last_event_id: self.accumulated_events.keys().last().cloned(),
            last_trade_id: self.accumulated_trades.keys().last().cloned(),
            events,
            trades,
            is_delta,
        }
    }

    pub fn stop(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Stopped;
        }
    }

    pub fn complete(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Completed;
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.error_reason = Some(reason.into());
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_graph::{EvaluationData, EventKind};
    use kite_positions::EntryData;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_event(execution_id: &str, parent: Option<&str>, at: DateTime<Utc>) -> ExecutionEvent {
        ExecutionEvent {
            execution_id: execution_id.to_string(),
            parent_execution_id: parent.map(str::to_string),
            node_id: "node-1".to_string(),
            node_type: "entrySignalNode",
            kind: EventKind::LogicCompleted,
            diagnostic: EvaluationData::Signal { condition: None, note: None },
            timestamp: at,
        }
    }

    fn entry(t: DateTime<Utc>, price: Decimal) -> EntryData {
        EntryData {
            entry_time: t,
            entry_price: price,
            quantity: dec!(1),
            multiplier: dec!(1),
            actual_quantity: None,
            symbol: "X".into(),
            exchange: None,
            side: kite_instrument::Side::Buy,
            instrument: "EQ".into(),
            strategy: "s".into(),
            node_id: "entry-1".into(),
            underlying_symbol: None,
            underlying_price_on_entry: None,
            node_variables_snapshot: json!({}),
            order_id: None,
            execution_id: None,
        }
    }

    #[test]
    fn ingest_then_emit_drains_delta_but_keeps_accumulated() {
        let dir = tempdir().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let t0 = Utc::now();
        let mut session = Session::start(dir.path(), "user-1", "strat-1", date, t0).unwrap();

        let mut gps = PositionStore::new();
        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();

        session.ingest_bucket(t0, vec![sample_event("exec-1", None, t0)], &gps).unwrap();

        let progress = Progress {
            current_tick: 1,
            total_ticks: Some(1),
            percentage: Some(100.0),
        };
        let snapshot = session.emit_snapshot(progress);
        assert_eq!(snapshot.delta.events.len(), 1);
        assert_eq!(snapshot.delta.trades.len(), 1);
        assert_eq!(snapshot.accumulated.events_history.len(), 1);
        assert_eq!(snapshot.accumulated.trades.len(), 1);
        drop(snapshot);

        // A second bucket with no new events/trades yields an empty delta.
        session.ingest_bucket(t0, Vec::new(), &gps).unwrap();
        let snapshot = session.emit_snapshot(progress);
        assert!(snapshot.delta.events.is_empty());
        assert!(snapshot.delta.trades.is_empty());
        assert_eq!(snapshot.accumulated.trades.len(), 1);
    }

    #[test]
    fn resume_without_last_id_returns_full_history() {
        let dir = tempdir().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let t0 = Utc::now();
        let mut session = Session::start(dir.path(), "user-1", "strat-1", date, t0).unwrap();
        let gps = PositionStore::new();
        session
            .ingest_bucket(t0, vec![sample_event("exec-1", None, t0), sample_event("exec-2", Some("exec-1"), t0)], &gps)
            .unwrap();

        let initial = session.resume(None, None);
        assert!(!initial.is_delta);
        assert_eq!(initial.events.len(), 2);
    }

    #[test]
    fn resume_after_last_event_id_returns_only_the_tail() {
        let dir = tempdir().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let t0 = Utc::now();
        let mut session = Session::start(dir.path(), "user-1", "strat-1", date, t0).unwrap();
        let gps = PositionStore::new();
        let events = (0..100).map(|i| sample_event(&format!("exec-{i}"), None, t0)).collect();
        session.ingest_bucket(t0, events, &gps).unwrap();

        let initial = session.resume(Some("exec-39"), None);
        assert!(initial.is_delta);
        assert_eq!(initial.events.len(), 60);
        assert_eq!(initial.events.first().unwrap().execution_id, "exec-40");
    }
}
