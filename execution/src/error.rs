use thiserror::Error;

/// Errors a concrete `OrderGateway` implementation may raise. Per §7, order
/// rejection/cancellation is reported *through* [`crate::order::OrderStatus`],
/// not through this error type — `OrderGatewayError` is reserved for transport
/// failures (order-status fetch failure, §7's "transient" row), which the
/// caller treats as "assume pending, retry next tick".
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OrderGatewayError {
    #[error("unknown order id `{0}`")]
    UnknownOrder(String),

    #[error("gateway transport failure: {0}")]
    Transport(String),
}
