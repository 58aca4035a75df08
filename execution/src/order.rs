use chrono::{DateTime, Utc};
use kite_instrument::{Exchange, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// How an order should be priced.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub enum OrderType {
    Market,
    Limit(Decimal),
}

/// Broker product/margin type (MIS/NRML/CNC equivalents).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum ProductType {
    Intraday,
    Carryforward,
    Delivery,
}

/// Order lifecycle status as reported by the gateway (§6 `OrderGateway`
/// contract).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    Complete,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Complete | OrderStatus::Rejected | OrderStatus::Cancelled)
    }
}

/// One order submission (§6). `node_id` is carried through for diagnostics and
/// for the gateway to attribute postback updates back to the originating node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderRequest {
    pub symbol: SmolStr,
    pub exchange: Exchange,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub node_id: String,
}

/// Immediate response to `place_order` (§6): the gateway's own id plus whatever
/// id the broker assigned, if different.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderAck {
    pub order_id: String,
    pub broker_order_id: Option<String>,
}

/// Response to `get_order_status` (§6).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderStatusSnapshot {
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Response to `cancel_order` (§6).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CancelResult {
    pub success: bool,
    pub reason: Option<String>,
}
