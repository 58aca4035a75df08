use crate::order::{CancelResult, OrderAck, OrderRequest, OrderStatusSnapshot};

/// The broker adapter contract (§6, out of scope per §1 — consumed via this
/// narrow interface). Implementations are expected to be cheap to clone and
/// safe to multiplex across sessions (§5's shared-resource policy); postback
/// updates arrive out-of-band and mutate the gateway's own in-memory order
/// view, which `get_order_status` reads back.
#[async_trait::async_trait]
pub trait OrderGateway: Send + Sync {
    type Error;

    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, Self::Error>;

    /// `refresh` requests a live round-trip to the broker rather than the
    /// gateway's cached postback-updated view (§6); backtest/sim gateways may
    /// ignore the distinction.
    async fn get_order_status(&self, order_id: &str, refresh: bool) -> Result<OrderStatusSnapshot, Self::Error>;

    async fn cancel_order(&self, order_id: &str) -> Result<CancelResult, Self::Error>;
}
