//! End-to-end coverage of the resume protocol at the scale spec.md's own
//! Scenario E names: 100 events emitted, a subscriber disconnects after
//! event 40, and reconnecting with `last_event_id = 40` must replay exactly
//! events 41-100, in order, with `is_delta = true`.

use chrono::{DateTime, TimeZone, Utc};
use kite_graph::{EvaluationData, EventKind, ExecutionEvent};
use kite_session::Session;
use tempfile::tempdir;

fn event(n: usize, at: DateTime<Utc>) -> ExecutionEvent {
    ExecutionEvent {
        execution_id: format!("exec-{n}"),
        parent_execution_id: (n > 0).then(|| format!("exec-{}", n - 1)),
        node_id: "entry-signal".to_string(),
        node_type: "entrySignalNode",
        kind: EventKind::LogicCompleted,
        diagnostic: EvaluationData::Signal { condition: None, note: None },
        timestamp: at,
    }
}

#[test]
fn reconnecting_with_an_id_forty_events_back_replays_only_the_tail() {
    let dir = tempdir().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
    let mut session = Session::start(dir.path(), "user-1", "strat-1", date, t0).unwrap();

    let positions = kite_positions::PositionStore::new();
    for n in 0..100 {
        let at = t0 + chrono::Duration::seconds(n as i64);
        session.ingest_bucket(at, vec![event(n, at)], &positions).unwrap();
    }
    assert_eq!(session.event_count(), 100);

    let resumed = session.resume(Some("exec-39"), None);
    assert!(resumed.is_delta);
    assert_eq!(resumed.events.len(), 60);
    assert_eq!(resumed.events.first().unwrap().execution_id, "exec-40");
    assert_eq!(resumed.events.last().unwrap().execution_id, "exec-99");
    for (i, e) in resumed.events.iter().enumerate() {
        assert_eq!(e.execution_id, format!("exec-{}", 40 + i));
    }

    // A fresh subscriber with no last-seen id at all gets the full history.
    let fresh = session.resume(None, None);
    assert!(!fresh.is_delta);
    assert_eq!(fresh.events.len(), 100);
}
