use crate::candle::Candle;
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Which recurrence an indicator spec computes (§4.3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
}

/// One registered `(symbol, timeframe, key, kind, params)` indicator (§4.3).
#[derive(Debug, Clone)]
pub struct IndicatorSpec {
    pub symbol: SmolStr,
    pub timeframe_minutes: u32,
    pub key: String,
    pub kind: IndicatorKind,
    pub period: usize,
}

/// Recurrence state carried between candle completions, kept separate from the
/// scalar value cached for expression lookups so RSI's two running averages
/// don't have to be packed into a single `f64`.
#[derive(Debug, Clone, Default)]
struct RecurrenceState {
    /// Previous indicator value (EMA) or previous RSI (unused directly, kept for
    /// symmetry/debuggability).
    prev_value: Option<f64>,
    /// Wilder's running average gain/loss, RSI only.
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct IndicatorSlot {
    latest: Option<f64>,
    state: RecurrenceState,
}

/// Incrementally recomputes registered indicators on every completed candle
/// (§4.3). Warm-up semantics: before a seed is possible the value is `None` and
/// downstream conditions treat that as non-satisfying, never as an error.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    specs: Vec<IndicatorSpec>,
    slots: IndexMap<(SmolStr, u32, String), IndicatorSlot>,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: IndicatorSpec) {
        let slot_key = (spec.symbol.clone(), spec.timeframe_minutes, spec.key.clone());
        self.slots.entry(slot_key).or_default();
        self.specs.push(spec);
    }

    /// Invoked when the Candle Builder completes a candle (§4.2 step 2). Writes
    /// each matching indicator's value into `candle.indicators` and updates the
    /// cached recurrence state for next time. `recent_closes` must supply the
    /// closes of all *previously* completed candles for this (symbol,
    /// timeframe), oldest first, not including `candle` itself.
    pub fn on_candle_complete(&mut self, candle: &mut Candle, recent_closes: &[Decimal]) {
        for spec in &self.specs {
            if spec.symbol != candle.symbol || spec.timeframe_minutes != candle.timeframe_minutes {
                continue;
            }
            let close = candle.close.to_f64().unwrap_or(0.0);
            let closes_f64: Vec<f64> = recent_closes
                .iter()
                .filter_map(|d| d.to_f64())
                .collect();

            let slot_key = (spec.symbol.clone(), spec.timeframe_minutes, spec.key.clone());
            let slot = self.slots.entry(slot_key).or_default();
            let value = match spec.kind {
                IndicatorKind::Sma => compute_sma(&closes_f64, close, spec.period),
                IndicatorKind::Ema => compute_ema(slot, &closes_f64, close, spec.period),
                IndicatorKind::Rsi => compute_rsi(slot, &closes_f64, close, spec.period),
            };

            slot.latest = value;
            candle.indicators.insert(spec.key.clone(), value);
        }
    }

    /// Latest cached scalar value for `(symbol, timeframe, key)`, or `None` if
    /// not yet warmed up / not registered.
    pub fn latest(&self, symbol: &str, timeframe_minutes: u32, key: &str) -> Option<f64> {
        self.slots
            .get(&(SmolStr::new(symbol), timeframe_minutes, key.to_string()))
            .and_then(|slot| slot.latest)
    }
}

/// SMA(period): average of the last `period` closes including the just-completed
/// one, or `None` if fewer than `period` closes exist yet.
fn compute_sma(prior_closes: &[f64], current_close: f64, period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let mut window: Vec<f64> = prior_closes.to_vec();
    window.push(current_close);
    if window.len() < period {
        return None;
    }
    let tail = &window[window.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// EMA(period): seeded from the SMA of the first `period` closes, thereafter
/// `EMA_t = alpha*close + (1-alpha)*EMA_{t-1}` with `alpha = 2/(period+1)`. O(1)
/// once seeded.
fn compute_ema(slot: &mut IndicatorSlot, prior_closes: &[f64], current_close: f64, period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    if let Some(prev) = slot.state.prev_value {
        let alpha = 2.0 / (period as f64 + 1.0);
        let value = alpha * current_close + (1.0 - alpha) * prev;
        slot.state.prev_value = Some(value);
        return Some(value);
    }

    // Not yet seeded: seed once we have `period` closes including this one.
    let mut window: Vec<f64> = prior_closes.to_vec();
    window.push(current_close);
    if window.len() < period {
        return None;
    }
    let seed_window = &window[window.len() - period..];
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    slot.state.prev_value = Some(seed);
    Some(seed)
}

/// RSI(period), Wilder smoothing. Seeded over the first `period+1` closes (i.e.
/// `period` deltas); thereafter `avg = (prev*(period-1) + current)/period`.
/// `avg_loss == 0 => RSI = 100`.
fn compute_rsi(slot: &mut IndicatorSlot, prior_closes: &[f64], current_close: f64, period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }

    if let (Some(avg_gain), Some(avg_loss)) = (slot.state.avg_gain, slot.state.avg_loss) {
        let prev_close = *prior_closes.last().unwrap_or(&current_close);
        let delta = current_close - prev_close;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        let avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        let avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        slot.state.avg_gain = Some(avg_gain);
        slot.state.avg_loss = Some(avg_loss);
        return Some(rsi_from_averages(avg_gain, avg_loss));
    }

    let mut window: Vec<f64> = prior_closes.to_vec();
    window.push(current_close);
    if window.len() < period + 1 {
        return None;
    }
    let seed_window = &window[window.len() - (period + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in seed_window.windows(2) {
        let delta = pair[1] - pair[0];
        gains += delta.max(0.0);
        losses += (-delta).max(0.0);
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    slot.state.avg_gain = Some(avg_gain);
    slot.state.avg_loss = Some(avg_loss);
    Some(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candle_with_close(close: Decimal) -> Candle {
        let ts = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        Candle {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            tick_count: 1,
            indicators: IndexMap::new(),
        }
    }

    #[test]
    fn sma_warms_up_then_computes() {
        let mut engine = IndicatorEngine::new();
        engine.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "sma3".into(),
            kind: IndicatorKind::Sma,
            period: 3,
        });

        let closes = [dec!(10), dec!(20), dec!(30), dec!(40)];
        let mut history = Vec::new();
        let mut last_value = None;
        for close in closes {
            let mut candle = candle_with_close(close);
            engine.on_candle_complete(&mut candle, &history);
            last_value = candle.indicators.get("sma3").copied().flatten();
            history.push(close);
        }
        assert_eq!(last_value, Some((20.0 + 30.0 + 40.0) / 3.0));
    }

    #[test]
    fn rsi_all_gains_is_100_all_losses_is_0() {
        let mut up = IndicatorEngine::new();
        up.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "rsi2".into(),
            kind: IndicatorKind::Rsi,
            period: 2,
        });
        let closes = [dec!(10), dec!(11), dec!(12)];
        let mut history = Vec::new();
        let mut last = None;
        for close in closes {
            let mut candle = candle_with_close(close);
            up.on_candle_complete(&mut candle, &history);
            last = candle.indicators.get("rsi2").copied().flatten();
            history.push(close);
        }
        assert_eq!(last, Some(100.0));

        let mut down = IndicatorEngine::new();
        down.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "rsi2".into(),
            kind: IndicatorKind::Rsi,
            period: 2,
        });
        let closes = [dec!(12), dec!(11), dec!(10)];
        let mut history = Vec::new();
        let mut last = None;
        for close in closes {
            let mut candle = candle_with_close(close);
            down.on_candle_complete(&mut candle, &history);
            last = candle.indicators.get("rsi2").copied().flatten();
            history.push(close);
        }
        assert_eq!(last, Some(0.0));
    }

    #[test]
    fn ema_seeds_from_sma_then_recurs() {
        let mut engine = IndicatorEngine::new();
        engine.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "ema2".into(),
            kind: IndicatorKind::Ema,
            period: 2,
        });
        let closes = [dec!(10), dec!(20), dec!(30)];
        let mut history = Vec::new();
        let mut values = Vec::new();
        for close in closes {
            let mut candle = candle_with_close(close);
            engine.on_candle_complete(&mut candle, &history);
            values.push(candle.indicators.get("ema2").copied().flatten());
            history.push(close);
        }
        assert_eq!(values[0], None);
        assert_eq!(values[1], Some(15.0));
        let alpha = 2.0 / 3.0;
        assert!((values[2].unwrap() - (alpha * 30.0 + (1.0 - alpha) * 15.0)).abs() < 1e-9);
    }

    #[test]
    fn missing_registration_returns_none() {
        let engine = IndicatorEngine::new();
        assert_eq!(engine.latest("NIFTY", 1, "sma3"), None);
    }
}
