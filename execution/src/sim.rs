use crate::error::OrderGatewayError;
use crate::gateway::OrderGateway;
use crate::order::{CancelResult, OrderAck, OrderRequest, OrderStatus, OrderStatusSnapshot};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An `OrderGateway` for live-mode tests and live-simulation: orders start
/// `Pending` and only transition once the test (standing in for the broker's
/// postback stream, §6) calls [`SimGateway::apply_postback`]. Lets tests exercise
/// the `EntryNode`/`ExitNode` Pending-polling loop (§4.5) and rejection handling
/// (§8 Scenario D) deterministically.
#[derive(Debug, Default)]
pub struct SimGateway {
    next_id: AtomicU64,
    orders: Mutex<HashMap<String, OrderStatusSnapshot>>,
}

impl SimGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a broker postback: updates the gateway's in-memory view of
    /// `order_id` so the next `get_order_status` reflects it.
    pub fn apply_postback(
        &self,
        order_id: &str,
        status: OrderStatus,
        filled_quantity: Decimal,
        average_price: Option<Decimal>,
        rejection_reason: Option<String>,
    ) {
        if let Some(snapshot) = self.orders.lock().unwrap().get_mut(order_id) {
            snapshot.status = status;
            snapshot.filled_quantity = filled_quantity;
            snapshot.average_price = average_price;
            snapshot.rejection_reason = rejection_reason;
            if status.is_terminal() {
                snapshot.completed_at = Some(chrono::Utc::now());
            }
        }
    }
}

#[async_trait::async_trait]
impl OrderGateway for SimGateway {
    type Error = OrderGatewayError;

    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, Self::Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let order_id = format!("sim-{id}");
        self.orders.lock().unwrap().insert(
            order_id.clone(),
            OrderStatusSnapshot {
                status: OrderStatus::Pending,
                filled_quantity: Decimal::ZERO,
                quantity: request.quantity,
                average_price: None,
                completed_at: None,
                rejection_reason: None,
            },
        );
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

    async fn cancel_order(&self, order_id: &str) -> Result<CancelResult, Self::Error> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(snapshot) if !snapshot.status.is_terminal() => {
                snapshot.status = OrderStatus::Cancelled;
                Ok(CancelResult {
                    success: true,
                    reason: None,
                })
            }
            Some(_) => Ok(CancelResult {
                success: false,
                reason: Some("order already in a terminal state".to_string()),
            }),
            None => Err(OrderGatewayError::UnknownOrder(order_id.to_string())),
        }
    }
}
