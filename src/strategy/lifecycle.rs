//! Position lifecycle: Flat -> Active -> Flat.
//!
//! A position opens when an entry fill creates a bracket and closes when the
//! gateway reports a flat account, or on an explicit close.

use super::bracket::{submit_bracket, BracketGroup, BracketPlan, ExitRole};
use super::slots::SlotBook;
use super::types::{Direction, HostMode, PositionSide};
use crate::exchange::{GatewayError, OrderGateway, OrderHandle, OrderRequest, OrderState, OrderUpdate};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// Result of an explicit close request.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// Market exit submitted and state reset
    Closed { handle: Option<OrderHandle>, quantity: Decimal },
    /// Gateway already flat; state reset without an order
    AlreadyFlat,
    NoPosition,
    NotLive,
}

/// What an exit callback did.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitEvent {
    /// Not a leg of the current bracket
    Unrelated,
    Updated(ExitRole),
    /// Leg reached a terminal state; `sibling_cancelled` if we had to cancel
    /// the other leg ourselves
    Closed {
        role: ExitRole,
        state: OrderState,
        sibling_cancelled: bool,
    },
}

/// The strategy's single position record.
#[derive(Debug, Clone, Default)]
pub struct Position {
    active: bool,
    side: Option<PositionSide>,
    entry_price: Option<Decimal>,
    bracket: Option<BracketGroup>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn side(&self) -> Option<PositionSide> {
        self.side
    }

    pub fn entry_price(&self) -> Option<Decimal> {
        self.entry_price
    }

    pub fn bracket(&self) -> Option<&BracketGroup> {
        self.bracket.as_ref()
    }

    pub fn bracket_id(&self) -> Option<&str> {
        self.bracket.as_ref().map(|b| b.id.as_str())
    }

    /// A new bracket may only be created while flat and without a bracket.
    pub fn can_open(&self) -> bool {
        !self.active && self.bracket.is_none()
    }

    /// Flat -> Active: submit the bracket, then drop opposite-direction entries.
    pub async fn open<G: OrderGateway + ?Sized>(
        &mut self,
        plan: &BracketPlan,
        bracket_id: String,
        slots: &mut SlotBook,
        gateway: &G,
    ) -> bool {
        if !self.can_open() {
            debug!(bracket = ?self.bracket_id(), "Position already open, fill does not create a bracket");
            return false;
        }

        let group = submit_bracket(plan, bracket_id, gateway).await;
        self.active = true;
        self.side = Some(plan.side);
        self.entry_price = Some(plan.entry_price);
        self.bracket = Some(group);

        let entry_direction = match plan.side {
            PositionSide::Long => Direction::Buy,
            PositionSide::Short => Direction::Sell,
        };
        slots
            .cancel_direction(entry_direction.opposite(), gateway)
            .await;

        info!(side = ?plan.side, entry = %plan.entry_price, "Position opened");
        true
    }

    /// Apply a callback for a bracket leg.
    ///
    /// When the gateway does not group OCO orders itself, a filled or
    /// cancelled leg cancels its sibling here.
    pub async fn on_exit_update<G: OrderGateway + ?Sized>(
        &mut self,
        update: &OrderUpdate,
        gateway: &G,
    ) -> ExitEvent {
        let Some(bracket) = self.bracket.as_mut() else {
            return ExitEvent::Unrelated;
        };
        let Some(role) = bracket.apply(update) else {
            return ExitEvent::Unrelated;
        };

        match update.state {
            OrderState::Filled => {
                info!(
                    bracket = %bracket.id,
                    leg = %role,
                    price = ?update.fill_price,
                    quantity = %update.filled_qty,
                    "Exit order filled"
                );
            }
            OrderState::Rejected => {
                error!(
                    bracket = %bracket.id,
                    leg = %role,
                    error = update.error.as_deref().unwrap_or("unknown"),
                    "Exit order rejected, position is not fully protected"
                );
                return ExitEvent::Closed {
                    role,
                    state: update.state,
                    sibling_cancelled: false,
                };
            }
            OrderState::Cancelled => {
                debug!(bracket = %bracket.id, leg = %role, "Exit order cancelled");
            }
            _ => return ExitEvent::Updated(role),
        }

        let sibling_cancelled = if gateway.supports_oco() {
            false
        } else {
            let cancelled = bracket.cancel_leg(role.sibling(), gateway).await;
            if cancelled {
                info!(bracket = %bracket.id, leg = %role.sibling(), "Cancelled sibling exit order");
            }
            cancelled
        };

        ExitEvent::Closed {
            role,
            state: update.state,
            sibling_cancelled,
        }
    }

    /// Active -> Flat once the gateway reports no position.
    ///
    /// Returns whether the position was reset.
    pub async fn check_flat<G: OrderGateway + ?Sized>(
        &mut self,
        slots: &mut SlotBook,
        gateway: &G,
    ) -> Result<bool, GatewayError> {
        if !self.active {
            return Ok(false);
        }
        let report = gateway.position().await?;
        if !report.is_flat() {
            return Ok(false);
        }

        info!(bracket = ?self.bracket_id(), "Position flat, resetting slots");
        self.reset(slots, gateway).await;
        Ok(true)
    }

    /// Flatten the position with a market order and reset.
    pub async fn close<G: OrderGateway + ?Sized>(
        &mut self,
        mode: HostMode,
        default_quantity: Decimal,
        slots: &mut SlotBook,
        gateway: &G,
    ) -> CloseOutcome {
        if !self.active {
            debug!("Close requested without an active position");
            return CloseOutcome::NoPosition;
        }
        if mode != HostMode::Live {
            warn!("Close requested outside live mode, ignored");
            return CloseOutcome::NotLive;
        }

        let quantity = match gateway.position().await {
            Ok(report) if report.is_flat() => {
                info!("Gateway already flat, resetting without exit order");
                self.reset(slots, gateway).await;
                return CloseOutcome::AlreadyFlat;
            }
            Ok(report) => report.quantity.abs(),
            Err(e) => {
                warn!(error = %e, quantity = %default_quantity, "Position query failed, closing configured quantity");
                default_quantity
            }
        };

        // Exit legs go first so they cannot fill against the market exit
        if let Some(bracket) = self.bracket.as_mut() {
            bracket.cancel_live(gateway).await;
        }

        let (action, name) = match self.side {
            Some(PositionSide::Short) => (PositionSide::Short.closing_action(), "ExitShort"),
            _ => (PositionSide::Long.closing_action(), "ExitLong"),
        };
        let handle = match gateway
            .submit(OrderRequest::market(action, quantity, name))
            .await
        {
            Ok(handle) => {
                info!(%handle, %quantity, order = name, "Market exit submitted");
                Some(handle)
            }
            Err(e) => {
                error!(error = %e, order = name, "Market exit submission failed");
                None
            }
        };

        self.reset(slots, gateway).await;
        CloseOutcome::Closed { handle, quantity }
    }

    /// Clear the position, cancel leftover exit legs and all entry slots.
    pub async fn reset<G: OrderGateway + ?Sized>(&mut self, slots: &mut SlotBook, gateway: &G) {
        if let Some(mut bracket) = self.bracket.take() {
            let cancelled = bracket.cancel_live(gateway).await;
            if cancelled > 0 {
                debug!(bracket = %bracket.id, cancelled, "Cancelled remaining exit orders");
            }
        }
        slots.cancel_all(gateway).await;

        self.active = false;
        self.side = None;
        self.entry_price = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockOrderGateway, OrderAction, PositionReport};
    use crate::strategy::bracket::{BracketParams, STOP_ORDER_NAME, TARGET_ORDER_NAME};
    use crate::strategy::slots::PlaceContext;
    use crate::strategy::types::{Level, SlotKey};
    use rust_decimal_macros::dec;

    fn long_plan() -> BracketPlan {
        BracketPlan::compute(
            PositionSide::Long,
            dec!(100),
            dec!(3),
            dec!(2),
            dec!(0.25),
            &BracketParams {
                target_multiplier: dec!(1.3),
                stop_multiplier: dec!(0.7),
            },
        )
    }

    fn bracket_gateway(supports_oco: bool) -> MockOrderGateway {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit()
            .withf(|r| r.name == TARGET_ORDER_NAME)
            .returning(|_| Ok(OrderHandle::new("t")));
        gateway
            .expect_submit()
            .withf(|r| r.name == STOP_ORDER_NAME)
            .returning(|_| Ok(OrderHandle::new("s")));
        gateway.expect_supports_oco().return_const(supports_oco);
        gateway
    }

    async fn open_long(gateway: &MockOrderGateway) -> (Position, SlotBook) {
        let mut position = Position::default();
        let mut slots = SlotBook::new();
        assert!(position.open(&long_plan(), "b-1".to_string(), &mut slots, gateway).await);
        (position, slots)
    }

    // =========================================================================
    // Open Tests
    // =========================================================================

    #[tokio::test]
    async fn test_open_marks_active_once() {
        let mut gateway = bracket_gateway(true);
        gateway.expect_cancel().times(0);
        let (mut position, mut slots) = open_long(&gateway).await;

        assert!(position.is_active());
        assert_eq!(position.side(), Some(PositionSide::Long));
        assert_eq!(position.bracket_id(), Some("b-1"));

        // Second fill for the same position never creates another bracket
        assert!(!position.open(&long_plan(), "b-2".to_string(), &mut slots, &gateway).await);
        assert_eq!(position.bracket_id(), Some("b-1"));
    }

    #[tokio::test]
    async fn test_open_cancels_opposite_slots() {
        let mut gateway = bracket_gateway(true);
        gateway
            .expect_submit()
            .withf(|r| r.name == "SellUpperEntry")
            .returning(|_| Ok(OrderHandle::new("e")));
        gateway.expect_cancel().times(1).returning(|_| Ok(()));
        let mut slots = SlotBook::new();
        let ctx = PlaceContext {
            mode: HostMode::Live,
            position_active: false,
            reported_position: Some(PositionReport::flat()),
            stable_level: Some(dec!(105)),
            market_price: Some(dec!(104)),
            eps: dec!(0.0625),
            quantity: dec!(3),
        };
        let sell_upper = SlotKey::new(Direction::Sell, Level::Upper);
        slots.place(sell_upper, &ctx, &gateway).await;

        let mut position = Position::default();
        position
            .open(&long_plan(), "b-1".to_string(), &mut slots, &gateway)
            .await;

        assert!(!slots.is_pending(sell_upper));
    }

    // =========================================================================
    // Exit Callback Tests
    // =========================================================================

    #[tokio::test]
    async fn test_target_fill_cancels_stop_without_oco() {
        let mut gateway = bracket_gateway(false);
        gateway
            .expect_cancel()
            .withf(|h| h.as_str() == "s")
            .times(1)
            .returning(|_| Ok(()));
        let (mut position, _slots) = open_long(&gateway).await;

        let fill = OrderUpdate::filled(OrderHandle::new("t"), TARGET_ORDER_NAME, dec!(102.5), dec!(3));
        let event = position.on_exit_update(&fill, &gateway).await;

        assert_eq!(
            event,
            ExitEvent::Closed {
                role: ExitRole::Target,
                state: OrderState::Filled,
                sibling_cancelled: true
            }
        );
        // The stop's own cancel confirmation does not touch the filled target
        let confirm = OrderUpdate::status(OrderHandle::new("s"), STOP_ORDER_NAME, OrderState::Cancelled);
        let event = position.on_exit_update(&confirm, &gateway).await;
        assert!(matches!(event, ExitEvent::Closed { sibling_cancelled: false, .. }));
    }

    #[tokio::test]
    async fn test_oco_gateway_handles_sibling() {
        let mut gateway = bracket_gateway(true);
        gateway.expect_cancel().times(0);
        let (mut position, _slots) = open_long(&gateway).await;

        let fill = OrderUpdate::filled(OrderHandle::new("s"), STOP_ORDER_NAME, dec!(98.75), dec!(3));
        let event = position.on_exit_update(&fill, &gateway).await;

        assert!(matches!(event, ExitEvent::Closed { sibling_cancelled: false, .. }));
        // Still active until the account is reported flat
        assert!(position.is_active());
    }

    #[tokio::test]
    async fn test_unrelated_callbacks() {
        let gateway = bracket_gateway(true);
        let mut position = Position::default();
        let update = OrderUpdate::status(OrderHandle::new("t"), TARGET_ORDER_NAME, OrderState::Working);
        assert_eq!(position.on_exit_update(&update, &gateway).await, ExitEvent::Unrelated);
    }

    // =========================================================================
    // Flatten / Close Tests
    // =========================================================================

    #[tokio::test]
    async fn test_check_flat_resets() {
        let mut gateway = bracket_gateway(true);
        gateway.expect_cancel().times(2).returning(|_| Ok(()));
        gateway
            .expect_position()
            .times(1)
            .returning(|| Ok(PositionReport::flat()));
        let (mut position, mut slots) = open_long(&gateway).await;

        assert!(position.check_flat(&mut slots, &gateway).await.unwrap());
        assert!(!position.is_active());
        assert_eq!(position.bracket_id(), None);
        assert!(slots.iter().all(|s| !s.pending && s.order.is_none()));

        // Nothing to check once flat
        assert!(!position.check_flat(&mut slots, &gateway).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_flat_keeps_open_position() {
        let mut gateway = bracket_gateway(true);
        gateway
            .expect_position()
            .returning(|| Ok(PositionReport { quantity: dec!(3) }));
        let (mut position, mut slots) = open_long(&gateway).await;

        assert!(!position.check_flat(&mut slots, &gateway).await.unwrap());
        assert!(position.is_active());
    }

    #[tokio::test]
    async fn test_close_submits_market_exit() {
        let mut gateway = bracket_gateway(true);
        gateway
            .expect_position()
            .returning(|| Ok(PositionReport { quantity: dec!(3) }));
        gateway.expect_cancel().times(2).returning(|_| Ok(()));
        gateway
            .expect_submit()
            .withf(|r| {
                r.name == "ExitLong" && r.action == OrderAction::Sell && r.quantity == dec!(3)
            })
            .times(1)
            .returning(|_| Ok(OrderHandle::new("x")));
        let (mut position, mut slots) = open_long(&gateway).await;

        let outcome = position
            .close(HostMode::Live, dec!(1), &mut slots, &gateway)
            .await;

        assert_eq!(
            outcome,
            CloseOutcome::Closed {
                handle: Some(OrderHandle::new("x")),
                quantity: dec!(3)
            }
        );
        assert!(!position.is_active());
    }

    #[tokio::test]
    async fn test_close_already_flat_resets_without_order() {
        let mut gateway = bracket_gateway(true);
        gateway
            .expect_position()
            .times(1)
            .returning(|| Ok(PositionReport::flat()));
        gateway.expect_cancel().times(2).returning(|_| Ok(()));
        gateway
            .expect_submit()
            .withf(|r| r.name.starts_with("Exit"))
            .times(0);
        let (mut position, mut slots) = open_long(&gateway).await;

        let outcome = position
            .close(HostMode::Live, dec!(3), &mut slots, &gateway)
            .await;

        assert_eq!(outcome, CloseOutcome::AlreadyFlat);
        assert!(!position.is_active());
        assert_eq!(position.bracket_id(), None);
        assert!(slots.iter().all(|s| !s.pending && s.order.is_none()));
    }

    #[tokio::test]
    async fn test_close_guards() {
        let gateway = bracket_gateway(true);
        let mut slots = SlotBook::new();
        let mut position = Position::default();
        assert_eq!(
            position.close(HostMode::Live, dec!(3), &mut slots, &gateway).await,
            CloseOutcome::NoPosition
        );

        let (mut position, mut slots) = open_long(&gateway).await;
        assert_eq!(
            position
                .close(HostMode::Historical, dec!(3), &mut slots, &gateway)
                .await,
            CloseOutcome::NotLive
        );
        assert!(position.is_active());
    }
}
