use crate::tick::Tick;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Default number of completed candles retained per (symbol, timeframe): must be
/// at least the longest indicator warm-up window configured.
pub const DEFAULT_RETENTION: usize = 500;

/// An OHLCV candle (§3). `low <= open,close <= high` and `tick_count >= 1` are
/// invariants enforced by construction; once completed a candle is never mutated
/// again except to have indicator values written into it by the Indicator Engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    pub symbol: SmolStr,
    pub timeframe_minutes: u32,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub tick_count: u64,
    #[serde(default)]
    pub indicators: IndexMap<String, Option<f64>>,
}

impl Candle {
    fn open_new(symbol: SmolStr, timeframe_minutes: u32, bucket: DateTime<Utc>, tick: &Tick) -> Self {
        Self {
            symbol,
            timeframe_minutes,
            timestamp: bucket,
            open: tick.ltp,
            high: tick.ltp,
            low: tick.ltp,
            close: tick.ltp,
            volume: tick.ltq,
            tick_count: 1,
            indicators: IndexMap::new(),
        }
    }

    fn absorb(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.ltp);
        self.low = self.low.min(tick.ltp);
        self.close = tick.ltp;
        self.volume += tick.ltq;
        self.tick_count += 1;
    }

    /// Invariant check (§8, property 6) — exposed for tests and diagnostics.
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.tick_count >= 1
    }
}

fn bucket_start(timestamp: DateTime<Utc>, timeframe_minutes: u32) -> DateTime<Utc> {
    let epoch_minutes = timestamp.timestamp() / 60;
    let bucket_minutes = (epoch_minutes / timeframe_minutes as i64) * timeframe_minutes as i64;
    DateTime::<Utc>::from_timestamp(bucket_minutes * 60, 0).expect("valid bucket timestamp")
}

/// Forming candle plus the append-only history for one (symbol, timeframe) pair.
#[derive(Debug, Clone)]
struct CandleSeries {
    timeframe_minutes: u32,
    current: Option<Candle>,
    completed: VecDeque<Candle>,
    retention: usize,
}

impl CandleSeries {
    fn new(timeframe_minutes: u32, retention: usize) -> Self {
        Self {
            timeframe_minutes,
            current: None,
            completed: VecDeque::with_capacity(retention),
            retention,
        }
    }

    fn push_completed(&mut self, candle: Candle) {
        if self.completed.len() >= self.retention {
            self.completed.pop_front();
        }
        self.completed.push_back(candle);
    }

    fn recent_closes(&self, count: usize) -> Vec<Decimal> {
        self.completed
            .iter()
            .rev()
            .take(count)
            .map(|c| c.close)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }
}

/// Aggregates ticks into OHLCV candles per (symbol, timeframe) (§4.2).
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    series: IndexMap<(SmolStr, u32), CandleSeries>,
    retention: usize,
    /// Supplemented feature (SPEC_FULL §11.3): drop ticks whose LTP deviates from
    /// the last seen LTP for that symbol by more than this fraction. `None`
    /// disables the guard (the default, matching the distilled spec exactly).
    max_ltp_deviation: Option<Decimal>,
    last_ltp: IndexMap<SmolStr, Decimal>,
}

impl Default for CandleBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl CandleBuilder {
    pub fn new(retention: usize) -> Self {
        Self {
            series: IndexMap::new(),
            retention,
            max_ltp_deviation: None,
            last_ltp: IndexMap::new(),
        }
    }

    /// Enable the staleness/fat-finger guard (off by default).
    pub fn with_max_ltp_deviation(mut self, fraction: Decimal) -> Self {
        self.max_ltp_deviation = Some(fraction);
        self
    }

    pub fn register(&mut self, symbol: impl Into<SmolStr>, timeframe_minutes: u32) {
        let symbol = symbol.into();
        self.series
            .entry((symbol, timeframe_minutes))
            .or_insert_with(|| CandleSeries::new(timeframe_minutes, self.retention));
    }

    fn passes_deviation_guard(&mut self, tick: &Tick) -> bool {
        let Some(max_deviation) = self.max_ltp_deviation else {
            return true;
        };
        let passes = match self.last_ltp.get(&tick.symbol) {
            Some(last) if !last.is_zero() => {
                let deviation = ((tick.ltp - last) / last).abs();
                deviation <= max_deviation
            }
            _ => true,
        };
        if passes {
            self.last_ltp.insert(tick.symbol.clone(), tick.ltp);
        }
        passes
    }

    /// Feed one tick into every registered timeframe for its symbol. Returns the
    /// candles that completed as a result (bucket rollover), in no particular
    /// cross-timeframe order; ties are resolved insertion-order per timeframe.
    ///
    /// Ticks older than the current bucket are dropped (out-of-order guard, §4.2).
    pub fn on_tick(&mut self, tick: &Tick) -> Vec<Candle> {
        if !self.passes_deviation_guard(tick) {
            tracing::warn!(symbol = %tick.symbol, ltp = %tick.ltp, "dropping tick: exceeds max LTP deviation");
            return Vec::new();
        }

        let mut completed = Vec::new();
        for ((symbol, timeframe), series) in self.series.iter_mut() {
            if symbol != &tick.symbol {
                continue;
            }
            let bucket = bucket_start(tick.timestamp, *timeframe);

            match &mut series.current {
                None => {
                    series.current = Some(Candle::open_new(symbol.clone(), *timeframe, bucket, tick));
                }
                Some(current) if current.timestamp == bucket => {
                    current.absorb(tick);
                }
                Some(current) if bucket < current.timestamp => {
                    tracing::warn!(
                        symbol = %symbol,
                        timeframe = *timeframe,
                        "dropping out-of-order tick before current bucket"
                    );
                }
                Some(_) => {
                    let finished = series.current.take().expect("checked Some above");
                    let new_current = Candle::open_new(symbol.clone(), *timeframe, bucket, tick);
                    series.current = Some(new_current);
                    completed.push(finished);
                }
            }
        }

        for candle in &completed {
            if let Some(series) = self
                .series
                .get_mut(&(candle.symbol.clone(), candle.timeframe_minutes))
            {
                series.push_completed(candle.clone());
            }
        }

        completed
    }

    /// Writes indicator values into the most recently completed candle for
    /// (symbol, timeframe), in place. The Indicator Engine computes into the
    /// candle instance `on_tick` already returned to its caller; this carries
    /// the same values into the copy held in history so that later reads —
    /// `completed_offset`, `EvalContext::indicator` — see them too (§4.3).
    pub fn set_completed_indicators(&mut self, symbol: &str, timeframe_minutes: u32, indicators: IndexMap<String, Option<f64>>) {
        if let Some(series) = self.series.get_mut(&(SmolStr::new(symbol), timeframe_minutes)) {
            if let Some(candle) = series.completed.back_mut() {
                candle.indicators = indicators;
            }
        }
    }

    /// Last `count` completed closes for (symbol, timeframe), oldest first —
    /// used by the Indicator Engine to seed/recur over warm-up windows.
    pub fn recent_closes(&self, symbol: &str, timeframe_minutes: u32, count: usize) -> Vec<Decimal> {
        self.series
            .get(&(SmolStr::new(symbol), timeframe_minutes))
            .map(|series| series.recent_closes(count))
            .unwrap_or_default()
    }

    pub fn current(&self, symbol: &str, timeframe_minutes: u32) -> Option<&Candle> {
        self.series
            .get(&(SmolStr::new(symbol), timeframe_minutes))?
            .current
            .as_ref()
    }

    /// The Nth-from-last completed candle (offset 0 = most recently completed).
    pub fn completed_offset(&self, symbol: &str, timeframe_minutes: u32, offset: usize) -> Option<&Candle> {
        let series = self.series.get(&(SmolStr::new(symbol), timeframe_minutes))?;
        let len = series.completed.len();
        let idx = len.checked_sub(1)?.checked_sub(offset)?;
        series.completed.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn tick(ts: DateTime<Utc>, ltp: Decimal) -> Tick {
        Tick::new(ts, "NIFTY", ltp, dec!(1))
    }

    #[test]
    fn completes_candle_on_boundary_crossing() {
        let mut builder = CandleBuilder::new(10);
        builder.register("NIFTY", 1);

        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 30).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();

        assert!(builder.on_tick(&tick(t0, dec!(100))).is_empty());
        assert!(builder.on_tick(&tick(t1, dec!(105))).is_empty());
        let completed = builder.on_tick(&tick(t2, dec!(103)));

        assert_eq!(completed.len(), 1);
        let candle = &completed[0];
        assert_eq!(candle.open, dec!(100));
        assert_eq!(candle.high, dec!(105));
        assert_eq!(candle.low, dec!(100));
        assert_eq!(candle.close, dec!(105));
        assert_eq!(candle.tick_count, 2);
        assert!(candle.is_valid());

        let forming = builder.current("NIFTY", 1).unwrap();
        assert_eq!(forming.open, dec!(103));
        assert_eq!(forming.tick_count, 1);
    }

    #[test]
    fn drops_out_of_order_ticks() {
        let mut builder = CandleBuilder::new(10);
        builder.register("NIFTY", 1);
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();

        builder.on_tick(&tick(t1, dec!(100)));
        let completed = builder.on_tick(&tick(t0, dec!(999)));
        assert!(completed.is_empty());
        // the out-of-order tick must not have mutated the current candle
        assert_eq!(builder.current("NIFTY", 1).unwrap().close, dec!(100));
    }

    #[test]
    fn retention_caps_history() {
        let mut builder = CandleBuilder::new(2);
        builder.register("NIFTY", 1);
        let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        for minute in 0..5 {
            let ts = base + chrono::Duration::minutes(minute);
            builder.on_tick(&tick(ts, Decimal::from(100 + minute)));
        }
        assert_eq!(builder.recent_closes("NIFTY", 1, 10).len(), 2);
    }

    #[test]
    fn deviation_guard_drops_implausible_ticks() {
        let mut builder = CandleBuilder::new(10).with_max_ltp_deviation(dec!(0.1));
        builder.register("NIFTY", 1);
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 1).unwrap();

        builder.on_tick(&tick(t0, dec!(100)));
        let completed = builder.on_tick(&tick(t1, dec!(500)));
        assert!(completed.is_empty());
        assert_eq!(builder.current("NIFTY", 1).unwrap().close, dec!(100));
    }
}
