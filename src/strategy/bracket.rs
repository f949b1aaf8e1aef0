//! Profit-target / stop-loss brackets.
//!
//! Exit distances scale with ATR, floored to whole ticks, with a minimum
//! number of ticks on each side. Both legs share one OCO group id.

use super::types::PositionSide;
use crate::exchange::{GatewayError, OrderGateway, OrderHandle, OrderRequest, OrderState, OrderType, OrderUpdate};
use crate::utils::{floor_to_tick, whole_ticks};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{error, info};

pub const MIN_TARGET_TICKS: u32 = 4;
pub const MIN_STOP_TICKS: u32 = 2;
/// ATR substitute, in ticks, when the indicator reports a non-positive value
pub const FALLBACK_ATR_TICKS: u32 = 10;

pub const TARGET_ORDER_NAME: &str = "ProfitTarget";
pub const STOP_ORDER_NAME: &str = "StopLoss";

/// ATR multipliers for the exit distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketParams {
    pub target_multiplier: Decimal,
    pub stop_multiplier: Decimal,
}

/// Computed exit prices for one entry fill.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketPlan {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub rounded_atr: Decimal,
    pub target_ticks: u32,
    pub stop_ticks: u32,
    pub target_price: Decimal,
    pub stop_price: Decimal,
}

impl BracketPlan {
    /// Derive target and stop from the fill price and current ATR.
    pub fn compute(
        side: PositionSide,
        entry_price: Decimal,
        quantity: Decimal,
        atr: Decimal,
        tick_size: Decimal,
        params: &BracketParams,
    ) -> Self {
        let atr = if atr <= Decimal::ZERO {
            let fallback = tick_size * Decimal::from(FALLBACK_ATR_TICKS);
            info!(%atr, %fallback, "Non-positive ATR, using tick-based fallback");
            fallback
        } else {
            atr
        };
        let rounded_atr = floor_to_tick(atr, tick_size);

        let target_ticks = whole_ticks(rounded_atr * params.target_multiplier, tick_size)
            .max(MIN_TARGET_TICKS);
        let stop_ticks =
            whole_ticks(rounded_atr * params.stop_multiplier, tick_size).max(MIN_STOP_TICKS);

        let target_offset = tick_size * Decimal::from(target_ticks);
        let stop_offset = tick_size * Decimal::from(stop_ticks);
        let (target_price, stop_price) = match side {
            PositionSide::Long => (entry_price + target_offset, entry_price - stop_offset),
            PositionSide::Short => (entry_price - target_offset, entry_price + stop_offset),
        };

        Self {
            side,
            entry_price,
            quantity,
            rounded_atr,
            target_ticks,
            stop_ticks,
            target_price,
            stop_price,
        }
    }
}

/// Which leg of a bracket an order is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitRole {
    Target,
    Stop,
}

impl ExitRole {
    pub fn sibling(&self) -> ExitRole {
        match self {
            ExitRole::Target => ExitRole::Stop,
            ExitRole::Stop => ExitRole::Target,
        }
    }
}

impl fmt::Display for ExitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitRole::Target => write!(f, "target"),
            ExitRole::Stop => write!(f, "stop"),
        }
    }
}

/// One exit order of a bracket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitLeg {
    /// `None` when the submission failed
    pub handle: Option<OrderHandle>,
    pub order_type: OrderType,
    pub price: Decimal,
    pub state: OrderState,
}

impl ExitLeg {
    /// Still resting at the gateway.
    pub fn is_live(&self) -> bool {
        self.handle.is_some() && self.state.is_cancelable()
    }
}

/// Linked target/stop pair of the open position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketGroup {
    pub id: String,
    pub target: ExitLeg,
    pub stop: ExitLeg,
}

impl BracketGroup {
    pub fn leg(&self, role: ExitRole) -> &ExitLeg {
        match role {
            ExitRole::Target => &self.target,
            ExitRole::Stop => &self.stop,
        }
    }

    fn leg_mut(&mut self, role: ExitRole) -> &mut ExitLeg {
        match role {
            ExitRole::Target => &mut self.target,
            ExitRole::Stop => &mut self.stop,
        }
    }

    /// Role of the leg owning `handle`.
    pub fn role_of(&self, handle: &OrderHandle) -> Option<ExitRole> {
        [ExitRole::Target, ExitRole::Stop]
            .into_iter()
            .find(|role| self.leg(*role).handle.as_ref() == Some(handle))
    }

    /// Apply a status callback. Returns the leg it belonged to.
    pub fn apply(&mut self, update: &OrderUpdate) -> Option<ExitRole> {
        let role = self.role_of(&update.handle)?;
        self.leg_mut(role).state = update.state;
        Some(role)
    }

    /// Cancel one leg if it is still live. The leg is marked cancelled as
    /// soon as the request is accepted.
    pub async fn cancel_leg<G: OrderGateway + ?Sized>(&mut self, role: ExitRole, gateway: &G) -> bool {
        let leg = self.leg(role);
        let Some(handle) = leg.handle.clone().filter(|_| leg.is_live()) else {
            return false;
        };
        if let Err(e) = gateway.cancel(&handle).await {
            error!(bracket = %self.id, leg = %role, error = %e, "Failed to cancel exit order");
            return false;
        }
        self.leg_mut(role).state = OrderState::Cancelled;
        true
    }

    /// Cancel every leg still live.
    pub async fn cancel_live<G: OrderGateway + ?Sized>(&mut self, gateway: &G) -> usize {
        let mut count = 0;
        for role in [ExitRole::Target, ExitRole::Stop] {
            if self.cancel_leg(role, gateway).await {
                count += 1;
            }
        }
        count
    }
}

/// Fresh bracket identifier: `bracket-<unix seconds>-<seq>`.
pub fn bracket_id(seq: u64) -> String {
    format!("bracket-{}-{}", Utc::now().timestamp(), seq)
}

/// Submit both exit legs as one OCO group.
///
/// A leg that fails to submit is logged and left without a handle; the
/// other leg is still submitted.
pub async fn submit_bracket<G: OrderGateway + ?Sized>(
    plan: &BracketPlan,
    id: String,
    gateway: &G,
) -> BracketGroup {
    let action = plan.side.closing_action();

    let target_request = OrderRequest::resting(
        action,
        OrderType::Limit,
        plan.quantity,
        plan.target_price,
        TARGET_ORDER_NAME,
    )
    .with_oco(id.clone());
    let stop_request = OrderRequest::resting(
        action,
        OrderType::StopMarket,
        plan.quantity,
        plan.stop_price,
        STOP_ORDER_NAME,
    )
    .with_oco(id.clone());

    let target = submit_leg(&id, ExitRole::Target, target_request, gateway).await;
    let stop = submit_leg(&id, ExitRole::Stop, stop_request, gateway).await;

    info!(
        bracket = %id,
        side = ?plan.side,
        entry = %plan.entry_price,
        quantity = %plan.quantity,
        target = %plan.target_price,
        target_ticks = plan.target_ticks,
        stop = %plan.stop_price,
        stop_ticks = plan.stop_ticks,
        "Bracket created"
    );

    BracketGroup { id, target, stop }
}

async fn submit_leg<G: OrderGateway + ?Sized>(
    id: &str,
    role: ExitRole,
    request: OrderRequest,
    gateway: &G,
) -> ExitLeg {
    let order_type = request.order_type;
    let price = request.working_price().unwrap_or_default();

    let (handle, state) = match gateway.submit(request).await {
        Ok(handle) => (Some(handle), OrderState::Submitted),
        Err(e) => {
            log_leg_failure(id, role, &e);
            (None, OrderState::Rejected)
        }
    };

    ExitLeg {
        handle,
        order_type,
        price,
        state,
    }
}

fn log_leg_failure(id: &str, role: ExitRole, e: &GatewayError) {
    error!(bracket = %id, leg = %role, error = %e, "Failed to submit exit order, position is not fully protected");
}
