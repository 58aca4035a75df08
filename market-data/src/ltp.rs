use crate::tick::Tick;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// Latest traded price (and companion fields) for one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtpEntry {
    pub ltp: Decimal,
    pub timestamp: DateTime<Utc>,
    pub volume: Option<Decimal>,
    pub oi: Option<Decimal>,
}

/// `map<symbol -> LtpEntry>`, updated on every tick (§3). Backed by an `IndexMap`
/// so iteration order matches update order for deterministic diagnostics, while
/// point lookups stay O(1) as required by the graph's hot loop.
#[derive(Debug, Clone, Default)]
pub struct LtpStore {
    entries: IndexMap<SmolStr, LtpEntry>,
}

impl LtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, tick: &Tick) {
        self.entries.insert(
            tick.symbol.clone(),
            LtpEntry {
                ltp: tick.ltp,
                timestamp: tick.timestamp,
                volume: tick.volume,
                oi: tick.oi,
            },
        );
    }

    pub fn get(&self, symbol: &str) -> Option<&LtpEntry> {
        self.entries.get(symbol)
    }

    pub fn ltp(&self, symbol: &str) -> Option<Decimal> {
        self.entries.get(symbol).map(|e| e.ltp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn get_is_latest_write() {
        let mut store = LtpStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 1).unwrap();
        store.update(&Tick::new(t0, "NIFTY", dec!(100), dec!(1)));
        store.update(&Tick::new(t1, "NIFTY", dec!(101), dec!(1)));
        assert_eq!(store.ltp("NIFTY"), Some(dec!(101)));
        assert_eq!(store.get("NIFTY").unwrap().timestamp, t1);
    }

    #[test]
    fn missing_symbol_is_none() {
        let store = LtpStore::new();
        assert_eq!(store.ltp("NIFTY"), None);
    }
}
