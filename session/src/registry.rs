use crate::error::SessionError;
use crate::session::Session;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One tracked session plus its last-activity timestamp, used by
/// [`SessionRegistry::evict_idle`] (§5: "Idle completed sessions age out after
/// a configurable TTL").
struct Entry {
    session: Arc<Mutex<Session>>,
    last_activity: DateTime<Utc>,
}

/// The process-wide table of live sessions (§4.8, §5). Many sessions run as
/// independent cooperative tasks (§5 "Parallelism"); the registry itself only
/// brokers lookup/eviction and holds no per-session scheduling state — each
/// session remains pinned to whichever worker is driving its scheduler.
pub struct SessionRegistry {
    sessions: Mutex<IndexMap<String, Entry>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(IndexMap::new()),
            idle_ttl,
        }
    }

    /// Default TTL per §5: 60 minutes of no activity.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(60 * 60))
    }

    pub fn insert(&self, session: Session, now: DateTime<Utc>) -> Arc<Mutex<Session>> {
        let id = session.session_id().to_string();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.lock().unwrap().insert(
            id,
            Entry {
                session: Arc::clone(&handle),
                last_activity: now,
            },
        );
        handle
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().unwrap().get(session_id).map(|e| Arc::clone(&e.session))
    }

    pub fn touch(&self, session_id: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(session_id) {
            entry.last_activity = now;
        }
    }

    pub fn require(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.get(session_id).ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().unwrap().shift_remove(session_id).map(|e| e.session)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts every session whose `last_activity` is older than the
    /// registry's idle TTL (§5). Persisted JSONL files are untouched — only
    /// the in-memory registry entry is dropped, so a reconnecting subscriber
    /// still catches up via the resume protocol reading the files directly.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.lock().unwrap();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| now.signed_duration_since(entry.last_activity).to_std().unwrap_or(Duration::ZERO) > self.idle_ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.shift_remove(id);
        }
        expired
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    #[test]
    fn evicts_only_sessions_past_the_ttl() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let dir = tempdir().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let t0 = Utc::now();

        let fresh = Session::start(dir.path(), "user-1", "fresh", date, t0).unwrap();
        let stale = Session::start(dir.path(), "user-1", "stale", date, t0).unwrap();
        registry.insert(fresh, t0);
        registry.insert(stale, t0 - ChronoDuration::minutes(90));

        let evicted = registry.evict_idle(t0);
        assert_eq!(evicted, vec!["user-1:stale:2026-07-28".to_string()]);
        assert_eq!(registry.len(), 1);
    }
}
