//! The bounded event/trade stream channel a running session's subscribers
//! read from (§5 point 3: "pushing an event to a stream buffer whose consumer
//! has not drained it ... the session blocks the scheduler until space is
//! available or a configurable drop-policy kicks in").
//!
//! A plain `Mutex<VecDeque>` + `Condvar` rather than `tokio::sync::mpsc`: the
//! supervisor pushes from inside the scheduler's synchronous `on_bucket`
//! callback (§4.7), and `tokio::sync::mpsc::Sender::blocking_send` panics if
//! called from within an async task — this type has no such restriction and
//! gives every [`DropPolicy`] direct control over which end of the queue is
//! trimmed.

use crate::config::DropPolicy;
use kite_session::StreamEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

struct Shared {
    queue: Mutex<VecDeque<StreamEvent>>,
    capacity: usize,
    drop_policy: DropPolicy,
    not_empty: Condvar,
    not_full: Condvar,
    closed: Mutex<bool>,
}

/// The producer half, held by the supervisor loop driving one session.
#[derive(Clone)]
pub struct StreamSender(Arc<Shared>);

/// The consumer half, handed to whatever transport (SSE endpoint, test
/// harness) is draining one session's stream.
#[derive(Clone)]
pub struct StreamReceiver(Arc<Shared>);

/// Creates a bounded [`StreamSender`]/[`StreamReceiver`] pair of the given
/// `capacity` and [`DropPolicy`] (§5 point 3, §10.4 `SessionConfig`).
pub fn bounded(capacity: usize, drop_policy: DropPolicy) -> (StreamSender, StreamReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
        capacity: capacity.max(1),
        drop_policy,
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        closed: Mutex::new(false),
    });
    (StreamSender(Arc::clone(&shared)), StreamReceiver(shared))
}

impl StreamSender {
    /// Pushes `event`, applying the channel's [`DropPolicy`] once full:
    /// `Block` waits for space, `DropOldest` evicts the queue head,
    /// `DropNewest` silently discards `event` itself.
    pub fn push(&self, event: StreamEvent) {
        let mut queue = self.0.queue.lock().unwrap();
        if queue.len() >= self.0.capacity {
            match self.0.drop_policy {
                DropPolicy::Block => {
                    while queue.len() >= self.0.capacity && !*self.0.closed.lock().unwrap() {
                        queue = self.0.not_full.wait(queue).unwrap();
                    }
                }
                DropPolicy::DropOldest => {
                    queue.pop_front();
                }
                DropPolicy::DropNewest => {
                    return;
                }
            }
        }
        queue.push_back(event);
        self.0.not_empty.notify_one();
    }

    /// Signals to [`StreamReceiver::recv_blocking`] that no further events
    /// are coming once the queue drains, and unblocks any waiter stuck in
    /// `Block` backpressure.
    pub fn close(&self) {
        *self.0.closed.lock().unwrap() = true;
        self.0.not_empty.notify_all();
        self.0.not_full.notify_all();
    }
}

impl StreamReceiver {
    /// Blocks the calling thread until an event is available or the sender
    /// has closed with an empty queue, in which case it returns `None`.
    /// Transport layers wrap this in `tokio::task::spawn_blocking` since the
    /// HTTP/SSE framing itself is out of scope (§1).
    pub fn recv_blocking(&self) -> Option<StreamEvent> {
        let mut queue = self.0.queue.lock().unwrap();
        loop {
            if let Some(event) = queue.pop_front() {
                self.0.not_full.notify_one();
                return Some(event);
            }
            if *self.0.closed.lock().unwrap() {
                return None;
            }
            queue = self.0.not_empty.wait(queue).unwrap();
        }
    }

    /// Non-blocking drain of whatever is currently queued, for tests and for
    /// transports that poll rather than block.
    pub fn try_recv_all(&self) -> Vec<StreamEvent> {
        let mut queue = self.0.queue.lock().unwrap();
        let drained: Vec<_> = queue.drain(..).collect();
        if !drained.is_empty() {
            self.0.not_full.notify_all();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_session::{OwnedAccumulatedState, OwnedDeltaState, OwnedSnapshot, SessionSummary};
    use kite_session::SessionStatus;
    use kite_scheduler::Progress;

    fn sample_snapshot(session_id: &str) -> OwnedSnapshot {
        OwnedSnapshot {
            session_id: session_id.to_string(),
            user_id: "u".into(),
            strategy_id: "s".into(),
            status: SessionStatus::Running,
            current_time: chrono::Utc::now(),
            accumulated: OwnedAccumulatedState {
                trades: Vec::new(),
                events_history: Vec::new(),
                summary: SessionSummary::default(),
            },
            delta: OwnedDeltaState {
                trades: Vec::new(),
                events: Vec::new(),
            },
            progress: Progress {
                current_tick: 0,
                total_ticks: None,
                percentage: None,
            },
        }
    }

    #[test]
    fn drop_newest_discards_the_incoming_event_when_full() {
        let (tx, rx) = bounded(1, DropPolicy::DropNewest);
        tx.push(StreamEvent::Data(sample_snapshot("a")));
        tx.push(StreamEvent::Data(sample_snapshot("b")));
        let drained = rx.try_recv_all();
        assert_eq!(drained.len(), 1);
        assert!(matches!(&drained[0], StreamEvent::Data(s) if s.session_id == "a"));
    }

    #[test]
    fn drop_oldest_evicts_the_queue_head_when_full() {
        let (tx, rx) = bounded(1, DropPolicy::DropOldest);
        tx.push(StreamEvent::Data(sample_snapshot("a")));
        tx.push(StreamEvent::Data(sample_snapshot("b")));
        let drained = rx.try_recv_all();
        assert_eq!(drained.len(), 1);
        assert!(matches!(&drained[0], StreamEvent::Data(s) if s.session_id == "b"));
    }

    #[test]
    fn recv_blocking_returns_none_once_closed_and_drained() {
        let (tx, rx) = bounded(4, DropPolicy::Block);
        tx.push(StreamEvent::Data(sample_snapshot("a")));
        tx.close();
        assert!(rx.recv_blocking().is_some());
        assert!(rx.recv_blocking().is_none());
    }
}
