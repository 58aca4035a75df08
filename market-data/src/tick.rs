use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A single trade print for a symbol (§3 Data Model).
///
/// Timestamps are timezone-aware (`DateTime<Utc>`, normalised to IST by the
/// ingesting caller per §4's time-arithmetic rule); ordering within a trading day
/// is monotonic non-decreasing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub symbol: SmolStr,
    pub ltp: Decimal,
    pub ltq: Decimal,
    pub volume: Option<Decimal>,
    pub oi: Option<Decimal>,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, symbol: impl Into<SmolStr>, ltp: Decimal, ltq: Decimal) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            ltp,
            ltq,
            volume: None,
            oi: None,
        }
    }
}

/// Source of time-ordered ticks for a trading day.
///
/// A backtest implementation is a finite, restartable iterator over historical
/// ticks; a live implementation is an effectively-infinite, non-restartable feed.
/// Both are modelled the same way: repeated calls to `next_tick` either yield the
/// next tick or `None` once the source is exhausted/closed.
#[async_trait::async_trait]
pub trait TickSource: Send {
    type Error;

    /// Returns the next tick in timestamp order, or `None` if the source has no
    /// more ticks (end of trading day for backtest; feed closed for live).
    async fn next_tick(&mut self) -> Result<Option<Tick>, Self::Error>;
}

/// An in-memory [`TickSource`] over a pre-loaded, already-sorted sequence of
/// ticks. Used for backtests and in tests; trivially restartable via `reset`.
#[derive(Debug, Clone)]
pub struct VecTickSource {
    ticks: Vec<Tick>,
    cursor: usize,
}

impl VecTickSource {
    pub fn new(ticks: Vec<Tick>) -> Self {
        Self { ticks, cursor: 0 }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[async_trait::async_trait]
impl TickSource for VecTickSource {
    type Error = std::convert::Infallible;

    async fn next_tick(&mut self) -> Result<Option<Tick>, Self::Error> {
        let next = self.ticks.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }
}
