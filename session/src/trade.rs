use chrono::{DateTime, Utc};
use kite_instrument::{Exchange, Side};
use kite_positions::{trade_id, Position, PositionStatus, TransactionStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use smol_str::SmolStr;

/// Lifecycle of a derived [`Trade`] projection (§3, §8 invariant 5).
/// `Open ⇔ qty_closed == 0`, `Partial ⇔ 0 < qty_closed < quantity`,
/// `Closed ⇔ qty_closed == quantity`. The current position model (§4.1) always
/// closes a transaction's full quantity in one exit, so `Partial` is reachable
/// only if a future partial-fill exit is layered in; the variant is kept so
/// that invariant holds by construction rather than by convention.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Partial,
    Closed,
}

/// A derived projection joining one entry execution with its subsequent exit
/// execution(s) for the same `(position_id, re_entry_num)` (§3 "Trade").
/// Upserted into the session's accumulated/delta trade lists whenever its
/// status changes (§4.8).
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    pub trade_id: String,
    pub position_id: String,
    pub re_entry_num: u32,
    pub position_num: u32,
    pub status: TradeStatus,
    pub symbol: SmolStr,
    pub exchange: Exchange,
    pub side: Side,
    pub instrument: String,
    pub strategy: String,
    pub node_id: String,
    pub quantity: Decimal,
    pub qty_closed: Decimal,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub pnl: Decimal,
    pub close_reason: Option<String>,
}

impl Trade {
    /// Projects a GPS [`Position`]'s *current* transaction (the last one
    /// added, i.e. `position_num`) into a [`Trade`] keyed by
    /// `(position_id, re_entry_num)` (§3). One `Position` with re-entries
    /// produces a distinct `Trade` per `position_num` over the session's
    /// lifetime, but only the latest is derivable from live `Position` state —
    /// earlier re-entries' trades are finalized (closed, never touched again)
    /// the tick their own transaction closed.
    pub fn from_position(position: &Position) -> Self {
        let re_entry_num = position.position_num.saturating_sub(1);
        let status = if position.status == PositionStatus::Closed {
            TradeStatus::Closed
        } else {
            TradeStatus::Open
        };
        let qty_closed = if status == TradeStatus::Closed {
            position.actual_quantity
        } else {
            Decimal::ZERO
        };
        let transaction = position.transactions.last();
        let close_reason = transaction.and_then(|tx| tx.close_reason.clone()).or_else(|| position.close_reason.clone());

        Self {
            trade_id: trade_id(&position.position_id, position.position_num),
            position_id: position.position_id.clone(),
            re_entry_num,
            position_num: position.position_num,
            status,
            symbol: position.symbol.clone(),
            exchange: position.exchange,
            side: position.side,
            instrument: position.instrument.clone(),
            strategy: position.strategy.clone(),
            node_id: position.node_id.clone(),
            quantity: position.actual_quantity,
            qty_closed,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time: position.exit_time,
            exit_price: position.exit_price,
            realized_pnl: position.realized_pnl,
            unrealized_pnl: position.unrealized_pnl,
            pnl: position.pnl,
            close_reason,
        }
    }

    /// True once every transaction this trade could ever reflect has closed;
    /// used by the session to decide whether continuing to re-derive this
    /// trade from GPS each bucket is still necessary (§4.8 upsert discipline).
    pub fn is_final(&self) -> bool {
        self.status == TradeStatus::Closed
    }
}

/// A closed transaction, re-projected as its own immutable [`Trade`] once a
/// position re-enters past it (§4.1 invariant 3: `position_num` keeps
/// climbing, but each prior transaction's trade never changes again).
pub fn trade_from_closed_transaction(position: &Position, tx: &kite_positions::Transaction) -> Option<Trade> {
    if tx.status != TransactionStatus::Closed {
        return None;
    }
    let exit_time = tx.exit_time?;
    let exit_price = tx.exit_price?;
    Some(Trade {
        trade_id: trade_id(&position.position_id, tx.position_num),
        position_id: position.position_id.clone(),
        re_entry_num: tx.re_entry_num,
        position_num: tx.position_num,
        status: TradeStatus::Closed,
        symbol: position.symbol.clone(),
        exchange: position.exchange,
        side: position.side,
        instrument: position.instrument.clone(),
        strategy: position.strategy.clone(),
        node_id: position.node_id.clone(),
        quantity: position.actual_quantity,
        qty_closed: position.actual_quantity,
        entry_time: tx.entry_time,
        entry_price: tx.entry_price,
        exit_time: Some(exit_time),
        exit_price: Some(exit_price),
        realized_pnl: tx.realized_pnl,
        unrealized_pnl: Decimal::ZERO,
        pnl: tx.realized_pnl,
        close_reason: tx.close_reason.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kite_positions::{EntryData, ExitData, PositionStore};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entry(t: DateTime<Utc>, price: Decimal) -> EntryData {
        EntryData {
            entry_time: t,
            entry_price: price,
            quantity: dec!(1),
            multiplier: dec!(1),
            actual_quantity: None,
            symbol: "X".into(),
            exchange: None,
            side: Side::Buy,
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
    fn open_position_projects_to_open_trade_with_zero_qty_closed() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();
        let position = gps.get_position("pos-1").unwrap();

        let trade = Trade::from_position(position);
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.qty_closed, Decimal::ZERO);
        assert_eq!(trade.trade_id, "pos-1");
    }

    #[test]
    fn closed_position_projects_to_closed_trade_with_full_qty_closed() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 18, 0).unwrap();
        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();
        gps.close_position(
            "pos-1",
            ExitData {
                exit_time: t1,
                exit_price: dec!(105),
                close_reason: Some("signal".into()),
                order_id: None,
                execution_id: None,
            },
        );
        let position = gps.get_position("pos-1").unwrap();

        let trade = Trade::from_position(position);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.qty_closed, trade.quantity);
        assert_eq!(trade.realized_pnl, dec!(5));
    }

    #[test]
    fn re_entry_keys_trade_id_by_position_num() {
        let mut gps = PositionStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 16, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 7, 28, 9, 18, 0).unwrap();
        gps.add_position("pos-1", entry(t0, dec!(100))).unwrap();
        gps.close_position(
            "pos-1",
            ExitData {
                exit_time: t1,
                exit_price: dec!(105),
                close_reason: None,
                order_id: None,
                execution_id: None,
            },
        );
        gps.add_position("pos-1", entry(t1, dec!(106))).unwrap();
        let position = gps.get_position("pos-1").unwrap();

        let trade = Trade::from_position(position);
        assert_eq!(trade.trade_id, "pos-1-r1");
        assert_eq!(trade.re_entry_num, 1);

        let prior = trade_from_closed_transaction(position, &position.transactions[0]).unwrap();
        assert_eq!(prior.trade_id, "pos-1");
        assert_eq!(prior.status, TradeStatus::Closed);
    }
}
