use crate::error::PositionError;
use crate::position::{EntryData, ExitData, Position, PositionStatus};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kite_market_data::LtpStore;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// The Global Position Store (GPS, C1, §4.1): the per-strategy transactional
/// position ledger. Owned by exactly one session (§5); not `Send`-restricted
/// itself, but never shared across sessions in practice.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: IndexMap<String, Position>,
    position_counters: IndexMap<String, u32>,
    node_variables: IndexMap<String, IndexMap<String, JsonValue>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new transaction for `position_id`. Fails with
    /// `ConcurrentOpenPosition` if one is already open (GPS invariant 1).
    /// `position_num` is seeded to 1 on first add and incremented per
    /// subsequent add for the same id (invariant 2), reset by [`Self::reset_day`].
    pub fn add_position(
        &mut self,
        position_id: &str,
        entry: EntryData,
    ) -> Result<&Position, PositionError> {
        if let Some(existing) = self.positions.get(position_id) {
            if existing.has_open_transaction() {
                return Err(PositionError::ConcurrentOpenPosition(position_id.to_string()));
            }
        }

        let counter = self.position_counters.entry(position_id.to_string()).or_insert(0);
        *counter += 1;
        let position_num = *counter;

        match self.positions.get_mut(position_id) {
            Some(existing) => existing.reopen(position_num, &entry),
            None => {
                self.positions.insert(
                    position_id.to_string(),
                    Position::new(position_id.to_string(), position_num, &entry),
                );
            }
        }

        Ok(self.positions.get(position_id).expect("just inserted"))
    }

    /// No-op if there is no open transaction for `position_id` (defensive
    /// idempotence, §4.1). Otherwise closes it, computing realized P&L by the
    /// side rule and mirroring it to the position's top-level summary fields.
    pub fn close_position(&mut self, position_id: &str, exit: ExitData) -> Option<&Position> {
        let position = self.positions.get_mut(position_id)?;
        if !position.has_open_transaction() {
            return None;
        }
        position.apply_close(&exit);
        Some(position)
    }

    /// Refreshes `current_price`/`unrealized_pnl`/`pnl` for every open position
    /// from `ltp`, using the position's own symbol, falling back to its
    /// underlying symbol, falling back to the position's last `current_price`
    /// if neither LTP is available (§4.1, open question #3).
    pub fn update_prices(&mut self, ltp: &LtpStore) {
        for position in self.positions.values_mut() {
            if position.status != PositionStatus::Open {
                continue;
            }
            let resolved = ltp
                .ltp(&position.symbol)
                .or_else(|| position.underlying_symbol.as_ref().and_then(|sym| ltp.ltp(sym)));
            if let Some(price) = resolved {
                position.refresh_price(price);
            }
        }
    }

    pub fn has_open_position(&self, position_id: &str) -> bool {
        self.positions
            .get(position_id)
            .is_some_and(Position::has_open_transaction)
    }

    /// Current `position_num` for `id`, or 0 if no position has ever been added.
    pub fn get_latest_position_num(&self, position_id: &str) -> u32 {
        self.position_counters.get(position_id).copied().unwrap_or(0)
    }

    pub fn get_position(&self, position_id: &str) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn get_open_positions(&self) -> Vec<&Position> {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .collect()
    }

    pub fn get_closed_positions(&self) -> Vec<&Position> {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Closed)
            .collect()
    }

    /// Clears `position_counters` only; historical transactions remain so
    /// reports spanning the reset stay meaningful (§4.1).
    pub fn reset_day(&mut self, _tick_time: DateTime<Utc>) {
        self.position_counters.clear();
    }

    /// Supplemented feature (SPEC_FULL §11.1): clears positions, node
    /// variables, and counters entirely, for re-initializing a session against
    /// a fresh strategy run.
    pub fn reset_strategy(&mut self) {
        self.positions.clear();
        self.position_counters.clear();
        self.node_variables.clear();
    }

    /// Stores a computed node variable (§4.5 Variables) under
    /// `node_variables[node_id][name]`, readable by later nodes' expressions via
    /// `node_variable(node_id, name)`.
    pub fn set_node_variable(&mut self, node_id: &str, name: &str, value: JsonValue) {
        self.node_variables
            .entry(node_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn get_node_variable(&self, node_id: &str, name: &str) -> Option<&JsonValue> {
        self.node_variables.get(node_id)?.get(name)
    }

    pub fn node_variable_as_decimal(&self, node_id: &str, name: &str) -> Option<Decimal> {
        self.get_node_variable(node_id, name)?
            .as_f64()
            .and_then(Decimal::from_f64_retain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kite_instrument::Side;
    use kite_market_data::Tick;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entry(entry_time: DateTime<Utc>, price: Decimal) -> EntryData {
        EntryData {
            entry_time,
            entry_price: price,
            quantity: dec!(1),
            multiplier: dec!(1),
            actual_quantity: None,
            symbol: "NIFTY".into(),
            exchange: None,
            side: Side::Buy,
            instrument: "EQ".into(),
            strategy: "strat-1".into(),
            node_id: "entry-1".into(),
            underlying_symbol: None,
            underlying_price_on_entry: None,
            node_variables_snapshot: json!({}),
            order_id: None,
            execution_id: None,
        }
    }

    fn exit(exit_time: DateTime<Utc>, price: Decimal) -> ExitData {
        ExitData {
            exit_time,
            exit_price: price,
            close_reason: Some("signal".into()),
            order_id: None,
            execution_id: None,
        }
    }

    #[test]
    fn add_then_close_computes_realized_pnl() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 18, 0).unwrap();

        gps.add_position("pos-1", entry(t0, dec!(101))).unwrap();
        assert!(gps.has_open_position("pos-1"));
        assert_eq!(gps.get_latest_position_num("pos-1"), 1);

        let position = gps.close_position("pos-1", exit(t1, dec!(94))).unwrap();
        assert_eq!(position.realized_pnl, dec!(-7));
        assert_eq!(position.pnl, dec!(-7));
        assert!(!gps.has_open_position("pos-1"));
    }

    #[test]
    fn concurrent_open_is_rejected() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        gps.add_position("pos-1", entry(t0, dec!(101))).unwrap();
        let err = gps.add_position("pos-1", entry(t0, dec!(101))).unwrap_err();
        assert_eq!(err, PositionError::ConcurrentOpenPosition("pos-1".to_string()));
    }

    #[test]
    fn close_without_open_transaction_is_noop() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        assert!(gps.close_position("missing", exit(t0, dec!(1))).is_none());
    }

    #[test]
    fn re_entry_increments_position_num() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 18, 0).unwrap();

        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();
        gps.close_position("pos-1", exit(t1, dec!(105))).unwrap();
        gps.add_position("pos-1", entry(t1, dec!(106))).unwrap();

        assert_eq!(gps.get_latest_position_num("pos-1"), 2);
        let position = gps.get_position("pos-1").unwrap();
        assert_eq!(position.transactions.len(), 2);
        assert_eq!(position.trade_id(), "pos-1-r1");
    }

    #[test]
    fn reset_day_clears_counters_but_keeps_history() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 18, 0).unwrap();
        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();
        gps.close_position("pos-1", exit(t1, dec!(105))).unwrap();

        gps.reset_day(t1);
        assert_eq!(gps.get_latest_position_num("pos-1"), 0);
        assert_eq!(gps.get_position("pos-1").unwrap().transactions.len(), 1);
    }

    #[test]
    fn update_prices_falls_back_to_underlying_symbol() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let mut e = entry(t0, dec!(100));
        e.symbol = "NIFTY:2026-07-30:OPT:24500:CE".into();
        e.underlying_symbol = Some("NIFTY".into());
        gps.add_position("pos-1", e).unwrap();

        let mut ltp = LtpStore::new();
        ltp.update(&Tick::new(t0, "NIFTY", dec!(24600), dec!(1)));
        gps.update_prices(&ltp);

        let position = gps.get_position("pos-1").unwrap();
        assert_eq!(position.current_price, dec!(24600));
        assert_eq!(position.unrealized_pnl, dec!(24500));
    }
}
