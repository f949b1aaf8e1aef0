//! Venue-agnostic order gateway.
//!
//! The strategy core never waits for an order outcome: `submit` and `cancel`
//! only hand the request to the host, and every state transition comes back
//! later as an [`OrderUpdate`](super::OrderUpdate) event.

use super::types::{OrderHandle, OrderRequest, OrderState, PositionReport};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported synchronously by a gateway call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("order rejected: {reason}")]
    Rejected { reason: String },
    #[error("unknown order {0}")]
    UnknownOrder(OrderHandle),
    #[error("order {handle} is {state:?} and cannot be cancelled")]
    NotCancelable { handle: OrderHandle, state: OrderState },
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Order routing interface of the host execution engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Hand a new order to the host. The handle identifies the order in
    /// later status callbacks.
    async fn submit(&self, request: OrderRequest) -> Result<OrderHandle, GatewayError>;

    /// Request cancellation. Best effort; confirmation arrives as a callback.
    async fn cancel(&self, handle: &OrderHandle) -> Result<(), GatewayError>;

    /// Current account position for the traded instrument.
    async fn position(&self) -> Result<PositionReport, GatewayError>;

    /// Whether the host cancels OCO siblings itself.
    fn supports_oco(&self) -> bool;
}
