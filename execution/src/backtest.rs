use crate::error::OrderGatewayError;
use crate::gateway::OrderGateway;
use crate::order::{CancelResult, OrderAck, OrderRequest, OrderStatus, OrderStatusSnapshot};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An `OrderGateway` that fills every order immediately at the price it is
/// handed (§4.5 EntryNode: "In backtest mode, immediately fill at LTP"). There
/// is no pending phase — `place_order` returns an already-`Complete` order, so
/// callers can synchronously follow up with `get_order_status`.
#[derive(Debug, Default)]
pub struct BacktestGateway {
    next_id: AtomicU64,
    orders: Mutex<HashMap<String, OrderStatusSnapshot>>,
}

impl BacktestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submits and immediately fills `request` at `fill_price`, returning the
    /// allocated order id. Convenience wrapper used by backtest EntryNode/ExitNode
    /// code paths that already know the fill price and don't need the full
    /// `OrderGateway::place_order` round-trip.
    pub fn fill_immediately(&self, request: &OrderRequest, fill_price: Decimal) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let order_id = format!("bt-{id}");
        self.orders.lock().unwrap().insert(
            order_id.clone(),
            OrderStatusSnapshot {
                status: OrderStatus::Complete,
                filled_quantity: request.quantity,
                quantity: request.quantity,
                average_price: Some(fill_price),
                completed_at: Some(Utc::now()),
                rejection_reason: None,
            },
        );
        order_id
    }
}

#[async_trait::async_trait]
impl OrderGateway for BacktestGateway {
    type Error = OrderGatewayError;

    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, Self::Error> {
        let order_id = self.fill_immediately(&request, Decimal::ZERO);
        Ok(OrderAck {
            order_id,
            broker_order_id: None,
        })
    }

    async fn get_order_status(&self, order_id: &str, _refresh: bool) -> Result<OrderStatusSnapshot, Self::Error> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderGatewayError::UnknownOrder(order_id.to_string()))
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<CancelResult, Self::Error> {
        Ok(CancelResult {
            success: false,
            reason: Some("backtest orders fill synchronously and cannot be cancelled".to_string()),
        })
    }
}
