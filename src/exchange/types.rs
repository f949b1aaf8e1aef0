//! Order and position types shared between the strategy core and gateways.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the gateway to a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHandle(pub String);

impl OrderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order action as understood by the host (opening vs closing side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    /// Open or add to a long position
    Buy,
    /// Open or add to a short position
    SellShort,
    /// Close a long position
    Sell,
    /// Close a short position
    BuyToCover,
}

impl OrderAction {
    /// True for actions that buy (open long or cover short).
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderAction::Buy | OrderAction::BuyToCover)
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "Market"),
            OrderType::Limit => write!(f, "Limit"),
            OrderType::StopMarket => write!(f, "Stop"),
        }
    }
}

/// Order lifecycle state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Submitted,
    Accepted,
    Working,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderState {
    /// States in which a cancel request is meaningful.
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            OrderState::Submitted | OrderState::Accepted | OrderState::Working
        )
    }
}

/// New order request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    /// One-cancels-other group shared by linked exit orders
    pub oco_group: Option<String>,
    /// Stable name used to route status callbacks back to their owner
    pub name: String,
}

impl OrderRequest {
    /// Market order with no prices attached.
    pub fn market(action: OrderAction, quantity: Decimal, name: impl Into<String>) -> Self {
        Self {
            action,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            oco_group: None,
            name: name.into(),
        }
    }

    /// Limit or stop-market order resting at `price`.
    pub fn resting(
        action: OrderAction,
        order_type: OrderType,
        quantity: Decimal,
        price: Decimal,
        name: impl Into<String>,
    ) -> Self {
        let (limit_price, stop_price) = match order_type {
            OrderType::Limit => (Some(price), None),
            OrderType::StopMarket => (None, Some(price)),
            OrderType::Market => (None, None),
        };
        Self {
            action,
            order_type,
            quantity,
            limit_price,
            stop_price,
            oco_group: None,
            name: name.into(),
        }
    }

    /// Attach an OCO group id.
    pub fn with_oco(mut self, group: impl Into<String>) -> Self {
        self.oco_group = Some(group.into());
        self
    }

    /// The price the order rests at (limit for limits, trigger for stops).
    pub fn working_price(&self) -> Option<Decimal> {
        match self.order_type {
            OrderType::Limit => self.limit_price,
            OrderType::StopMarket => self.stop_price,
            OrderType::Market => None,
        }
    }
}

/// Asynchronous order status callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderUpdate {
    pub handle: OrderHandle,
    /// Name given at submission time
    pub name: String,
    pub state: OrderState,
    pub fill_price: Option<Decimal>,
    pub filled_qty: Decimal,
    pub error: Option<String>,
}

impl OrderUpdate {
    /// Non-fill state transition.
    pub fn status(handle: OrderHandle, name: impl Into<String>, state: OrderState) -> Self {
        Self {
            handle,
            name: name.into(),
            state,
            fill_price: None,
            filled_qty: Decimal::ZERO,
            error: None,
        }
    }

    /// Complete fill at `price`.
    pub fn filled(
        handle: OrderHandle,
        name: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            handle,
            name: name.into(),
            state: OrderState::Filled,
            fill_price: Some(price),
            filled_qty: quantity,
            error: None,
        }
    }

    /// Gateway rejection with a reason.
    pub fn rejected(handle: OrderHandle, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            state: OrderState::Rejected,
            fill_price: None,
            filled_qty: Decimal::ZERO,
            error: Some(error.into()),
        }
    }
}

/// Market position as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PositionReport {
    /// Signed quantity: positive long, negative short, zero flat
    pub quantity: Decimal,
}

impl PositionReport {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cancelable_states() {
        assert!(OrderState::Submitted.is_cancelable());
        assert!(OrderState::Accepted.is_cancelable());
        assert!(OrderState::Working.is_cancelable());
        assert!(!OrderState::Filled.is_cancelable());
        assert!(!OrderState::Cancelled.is_cancelable());
        assert!(!OrderState::Rejected.is_cancelable());
    }

    #[test]
    fn test_resting_request_prices() {
        let limit = OrderRequest::resting(
            OrderAction::Buy,
            OrderType::Limit,
            dec!(3),
            dec!(99.50),
            "BuyLowerEntry",
        );
        assert_eq!(limit.limit_price, Some(dec!(99.50)));
        assert_eq!(limit.stop_price, None);
        assert_eq!(limit.working_price(), Some(dec!(99.50)));

        let stop = OrderRequest::resting(
            OrderAction::SellShort,
            OrderType::StopMarket,
            dec!(3),
            dec!(98.00),
            "SellLowerEntry",
        )
        .with_oco("grp");
        assert_eq!(stop.stop_price, Some(dec!(98.00)));
        assert_eq!(stop.limit_price, None);
        assert_eq!(stop.oco_group.as_deref(), Some("grp"));
    }

    #[test]
    fn test_position_report() {
        assert!(PositionReport::flat().is_flat());
        assert!(!PositionReport { quantity: dec!(-3) }.is_flat());
    }
}
