use chrono::{DateTime, Utc};
use kite_instrument::{Exchange, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use smol_str::SmolStr;

/// Lifecycle of a [`Position`] (§3 Data Model).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Lifecycle of a single [`Transaction`]. A position has at most one `Open`
/// transaction at any time (GPS invariant 1, §4.1).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Open,
    Closed,
}

/// One entry-fill/exit-fill pair within a [`Position`]'s lifetime (§3).
/// `re_entry_num = position_num - 1` is the canonical re-entry index (§4.1
/// invariant 3), also used to format `trade_id` as `<position_id>-r<N>`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transaction {
    pub status: TransactionStatus,
    pub position_num: u32,
    pub re_entry_num: u32,
    pub order_id: Option<String>,
    pub execution_id: Option<String>,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Decimal,
    /// Supplemented feature (SPEC_FULL §11.2): why the position closed
    /// (`signal`, `square_off`, `eod`, `position_already_closed`, …).
    pub close_reason: Option<String>,
}

impl Transaction {
    fn open(position_num: u32, entry: &EntryData) -> Self {
        Self {
            status: TransactionStatus::Open,
            position_num,
            re_entry_num: position_num.saturating_sub(1),
            order_id: entry.order_id.clone(),
            execution_id: entry.execution_id.clone(),
            entry_time: entry.entry_time,
            entry_price: entry.entry_price,
            exit_time: None,
            exit_price: None,
            realized_pnl: Decimal::ZERO,
            close_reason: None,
        }
    }

    /// Transaction P&L per the side rule (§3 invariant 4): BUY profits when exit
    /// exceeds entry, SELL profits when entry exceeds exit.
    fn close(&mut self, side: Side, actual_quantity: Decimal, exit: &ExitData) {
        self.status = TransactionStatus::Closed;
        self.exit_time = Some(exit.exit_time);
        self.exit_price = Some(exit.exit_price);
        self.close_reason = exit.close_reason.clone();
        let diff = match side {
            Side::Buy => exit.exit_price - self.entry_price,
            Side::Sell => self.entry_price - exit.exit_price,
        };
        self.realized_pnl = diff * actual_quantity;
    }
}

/// Input to [`crate::PositionStore::add_position`] (§4.1).
#[derive(Debug, Clone)]
pub struct EntryData {
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    /// Pre-computed `quantity * multiplier * strategy_scale` if the caller (the
    /// EntryNode) already did the scale multiplication; otherwise the store
    /// computes `quantity * multiplier`.
    pub actual_quantity: Option<Decimal>,
    pub symbol: SmolStr,
    pub exchange: Option<Exchange>,
    pub side: Side,
    pub instrument: String,
    pub strategy: String,
    pub node_id: String,
    pub underlying_symbol: Option<SmolStr>,
    pub underlying_price_on_entry: Option<Decimal>,
    pub node_variables_snapshot: JsonValue,
    pub order_id: Option<String>,
    pub execution_id: Option<String>,
}

/// Input to [`crate::PositionStore::close_position`] (§4.1).
#[derive(Debug, Clone)]
pub struct ExitData {
    pub exit_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub close_reason: Option<String>,
    pub order_id: Option<String>,
    pub execution_id: Option<String>,
}

/// The per-strategy position ledger entity (§3 Data Model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub status: PositionStatus,
    pub position_num: u32,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub pnl: Decimal,
    pub actual_quantity: Decimal,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    pub symbol: SmolStr,
    pub exchange: Exchange,
    pub side: Side,
    pub instrument: String,
    pub strategy: String,
    pub node_id: String,
    pub underlying_symbol: Option<SmolStr>,
    pub underlying_price_on_entry: Option<Decimal>,
    pub node_variables_snapshot: JsonValue,
    pub close_reason: Option<String>,
    pub transactions: Vec<Transaction>,
}

impl Position {
    pub(crate) fn new(position_id: String, position_num: u32, entry: &EntryData) -> Self {
        let actual_quantity = entry
            .actual_quantity
            .unwrap_or(entry.quantity * entry.multiplier);
        let exchange = entry
            .exchange
            .unwrap_or_else(|| Exchange::infer_from_symbol(&entry.symbol));

        Self {
            position_id,
            status: PositionStatus::Open,
            position_num,
            entry_time: entry.entry_time,
            exit_time: None,
            entry_price: entry.entry_price,
            exit_price: None,
            current_price: entry.entry_price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            pnl: Decimal::ZERO,
            actual_quantity,
            quantity: entry.quantity,
            multiplier: entry.multiplier,
            symbol: entry.symbol.clone(),
            exchange,
            side: entry.side,
            instrument: entry.instrument.clone(),
            strategy: entry.strategy.clone(),
            node_id: entry.node_id.clone(),
            underlying_symbol: entry.underlying_symbol.clone(),
            underlying_price_on_entry: entry.underlying_price_on_entry,
            node_variables_snapshot: entry.node_variables_snapshot.clone(),
            close_reason: None,
            transactions: vec![Transaction::open(position_num, entry)],
        }
    }

    pub(crate) fn open_transaction_mut(&mut self) -> Option<&mut Transaction> {
        self.transactions
            .last_mut()
            .filter(|t| t.status == TransactionStatus::Open)
    }

    pub(crate) fn has_open_transaction(&self) -> bool {
        self.transactions
            .last()
            .is_some_and(|t| t.status == TransactionStatus::Open)
    }

    pub(crate) fn reopen(&mut self, position_num: u32, entry: &EntryData) {
        self.status = PositionStatus::Open;
        self.position_num = position_num;
        self.entry_time = entry.entry_time;
        self.exit_time = None;
        self.entry_price = entry.entry_price;
        self.exit_price = None;
        self.current_price = entry.entry_price;
        self.unrealized_pnl = Decimal::ZERO;
        self.actual_quantity = entry
            .actual_quantity
            .unwrap_or(entry.quantity * entry.multiplier);
        self.quantity = entry.quantity;
        self.multiplier = entry.multiplier;
        self.underlying_price_on_entry = entry.underlying_price_on_entry;
        self.node_variables_snapshot = entry.node_variables_snapshot.clone();
        self.close_reason = None;
        self.transactions.push(Transaction::open(position_num, entry));
    }

    pub(crate) fn apply_close(&mut self, exit: &ExitData) {
        let side = self.side;
        let actual_quantity = self.actual_quantity;
        if let Some(tx) = self.open_transaction_mut() {
            tx.close(side, actual_quantity, exit);
        }
        self.status = PositionStatus::Closed;
        self.exit_time = Some(exit.exit_time);
        self.exit_price = Some(exit.exit_price);
        self.close_reason = exit.close_reason.clone();
        self.current_price = exit.exit_price;
        self.unrealized_pnl = Decimal::ZERO;
        self.realized_pnl = self
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Closed)
            .map(|t| t.realized_pnl)
            .sum();
        self.pnl = self.realized_pnl + self.unrealized_pnl;
    }

    /// Recompute `current_price`/`unrealized_pnl`/`pnl` from a fresh LTP (§4.1
    /// `update_prices`). No-op for closed positions (invariant 3: unrealized is
    /// always zero once closed).
    pub(crate) fn refresh_price(&mut self, ltp: Decimal) {
        if self.status == PositionStatus::Closed {
            return;
        }
        self.current_price = ltp;
        self.unrealized_pnl = match self.side {
            Side::Buy => (ltp - self.entry_price) * self.actual_quantity,
            Side::Sell => (self.entry_price - ltp) * self.actual_quantity,
        };
        self.pnl = self.realized_pnl + self.unrealized_pnl;
    }

    /// `<position_id>` for the first position, `<position_id>-r<N>` for
    /// re-entry N (§4.1 invariant 3).
    pub fn trade_id(&self) -> String {
        trade_id(&self.position_id, self.position_num)
    }
}

/// `re_entry_num = position_num - 1`; `trade_id` formatting rule (§4.1 invariant
/// 3), exposed standalone so the session layer (§4.8 trade projections) can
/// derive the same id without a `Position` in hand.
pub fn trade_id(position_id: &str, position_num: u32) -> String {
    let re_entry_num = position_num.saturating_sub(1);
    if re_entry_num == 0 {
        position_id.to_string()
    } else {
        format!("{position_id}-r{re_entry_num}")
    }
}
