use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// What the supervisor does when a session's stream subscriber falls behind
/// and the bounded event channel is full (§5 point 3).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Blocks the scheduler thread until the subscriber drains space — the
    /// default: never silently loses an event.
    #[default]
    Block,
    /// Drops the oldest unconsumed [`kite_session::StreamEvent`] to make room
    /// for the new one.
    DropOldest,
    /// Drops the newest emission instead of blocking; the slow subscriber
    /// will catch up via the resume protocol (§6) on its next reconnect.
    DropNewest,
}

/// Everything the embedding application configures per session run
/// (§10.4): where to persist, how fast to replay, and how the stream channel
/// behaves under backpressure. This crate does not read files or environment
/// variables to populate it — that wiring belongs to the embedder.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root directory under which `<date>/<user_id>/<strategy_id>/` session
    /// directories are created (§6).
    pub persistence_root: PathBuf,
    /// Live-simulation replay speed, ticks processed per wall-clock second
    /// relative to 1x (§4.7). Ignored in backtest/live mode.
    pub speed_multiplier: Decimal,
    /// How often a snapshot is pushed to a session's subscribers, independent
    /// of bucket cadence (§4.8): "every 1 s wall-clock at 1x speed, shorter at
    /// higher speeds, bounded >= 50 ms".
    pub emission_interval: Duration,
    /// Capacity of the bounded `StreamEvent` channel (§5 point 3).
    pub buffer_capacity: usize,
    pub drop_policy: DropPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persistence_root: PathBuf::from("./data/kite"),
            speed_multiplier: Decimal::ONE,
            emission_interval: Duration::from_secs(1),
            buffer_capacity: 256,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Clamps `emission_interval` to the spec's floor of 50ms (§4.8), for
    /// embedders that construct the interval from a user-supplied speed
    /// multiplier rather than accepting the default.
    pub fn clamped_emission_interval(&self) -> Duration {
        self.emission_interval.max(Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_drop_policy_blocks() {
        assert_eq!(SessionConfig::default().drop_policy, DropPolicy::Block);
    }

    #[test]
    fn emission_interval_floor_is_fifty_millis() {
        let mut config = SessionConfig::default();
        config.emission_interval = Duration::from_millis(5);
        assert_eq!(config.clamped_emission_interval(), Duration::from_millis(50));
    }
}
