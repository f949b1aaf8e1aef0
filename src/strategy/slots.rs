//! Entry slot management.
//!
//! Six slots, one per (direction, level). Each holds at most one live entry
//! order. Placement runs a fixed guard sequence, picks the order type from
//! the entry table and keeps buy and sell intent mutually exclusive.

use super::types::{Direction, HostMode, Level, SlotKey};
use crate::exchange::{
    GatewayError, OrderGateway, OrderHandle, OrderRequest, OrderState, OrderType, OrderUpdate,
    PositionReport,
};
use crate::utils::approx_eq;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a placement request was refused. Refusals never mutate state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("cannot place orders in historical mode")]
    NotLive,
    #[error("position already active, close existing position first")]
    PositionActive,
    #[error("account position unknown: {0}")]
    PositionUnknown(String),
    #[error("no stable {0} level available yet (need 3 matching prices in a row)")]
    LevelUnavailable(Level),
    #[error("no market price received yet")]
    NoMarketPrice,
    #[error("cannot place {slot} ({order_type}) at {level} - must be {required} current price {price}")]
    WrongSide {
        slot: SlotKey,
        order_type: OrderType,
        level: Decimal,
        price: Decimal,
        required: &'static str,
    },
}

/// Order type and flavour chosen for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPlan {
    pub order_type: OrderType,
    pub style: &'static str,
}

/// Entry table: validity region and order type per slot.
///
/// Upper and Lower slots refuse the wrong side of price; Mean slots always
/// place and only switch between limit and stop.
pub fn entry_rule(key: SlotKey, level: Decimal, price: Decimal) -> Result<EntryPlan, Rejection> {
    let wrong_side = |order_type, required| Rejection::WrongSide {
        slot: key,
        order_type,
        level,
        price,
        required,
    };

    match (key.direction, key.level) {
        (Direction::Buy, Level::Upper) if level > price => Ok(EntryPlan {
            order_type: OrderType::StopMarket,
            style: "breakout",
        }),
        (Direction::Buy, Level::Upper) => Err(wrong_side(OrderType::StopMarket, "above")),
        (Direction::Sell, Level::Upper) if level >= price => Ok(EntryPlan {
            order_type: OrderType::Limit,
            style: "fade",
        }),
        (Direction::Sell, Level::Upper) => Err(wrong_side(OrderType::Limit, "at or above")),
        (Direction::Buy, Level::Mean) if price > level => Ok(EntryPlan {
            order_type: OrderType::Limit,
            style: "pullback",
        }),
        (Direction::Buy, Level::Mean) => Ok(EntryPlan {
            order_type: OrderType::StopMarket,
            style: "breakout",
        }),
        (Direction::Sell, Level::Mean) if price < level => Ok(EntryPlan {
            order_type: OrderType::Limit,
            style: "rally",
        }),
        (Direction::Sell, Level::Mean) => Ok(EntryPlan {
            order_type: OrderType::StopMarket,
            style: "breakdown",
        }),
        (Direction::Buy, Level::Lower) if level <= price => Ok(EntryPlan {
            order_type: OrderType::Limit,
            style: "fade",
        }),
        (Direction::Buy, Level::Lower) => Err(wrong_side(OrderType::Limit, "at or below")),
        (Direction::Sell, Level::Lower) if level <= price => Ok(EntryPlan {
            order_type: OrderType::StopMarket,
            style: "breakdown",
        }),
        (Direction::Sell, Level::Lower) => Err(wrong_side(OrderType::StopMarket, "at or below")),
    }
}

/// Inputs the guard sequence needs, gathered by the caller.
#[derive(Debug, Clone)]
pub struct PlaceContext {
    pub mode: HostMode,
    pub position_active: bool,
    /// Account position from the gateway; `None` if it could not be read
    pub reported_position: Option<PositionReport>,
    pub stable_level: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub eps: Decimal,
    pub quantity: Decimal,
}

/// Result of a placement request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome {
    Submitted {
        handle: OrderHandle,
        order_type: OrderType,
        price: Decimal,
    },
    Replaced {
        handle: OrderHandle,
        order_type: OrderType,
        price: Decimal,
    },
    AlreadyPlaced,
    Rejected(Rejection),
    SubmitFailed(GatewayError),
}

impl PlaceOutcome {
    /// True when a new order is now resting in the slot.
    pub fn is_placed(&self) -> bool {
        matches!(
            self,
            PlaceOutcome::Submitted { .. } | PlaceOutcome::Replaced { .. }
        )
    }
}

/// Entry order currently owned by a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedOrder {
    pub handle: OrderHandle,
    pub order_type: OrderType,
    pub price: Decimal,
    pub state: OrderState,
}

/// One armable entry slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSlot {
    pub key: SlotKey,
    pub pending: bool,
    pub order: Option<TrackedOrder>,
}

impl OrderSlot {
    fn new(key: SlotKey) -> Self {
        Self {
            key,
            pending: false,
            order: None,
        }
    }

    fn clear(&mut self) {
        self.pending = false;
        self.order = None;
    }
}

/// What an order callback meant for the slots.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotUpdate {
    /// Callback is not for an entry order
    NotEntry,
    /// Callback for an order the slot no longer owns
    Stale(SlotKey),
    /// Non-terminal progress of the tracked order
    Tracked(SlotKey),
    /// Slot cleared by a reject or cancel
    Cleared(SlotKey),
    /// Tracked entry filled; slot cleared
    Filled {
        key: SlotKey,
        price: Decimal,
        quantity: Decimal,
    },
}

/// The six entry slots.
#[derive(Debug, Clone)]
pub struct SlotBook {
    slots: [OrderSlot; 6],
}

impl Default for SlotBook {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotBook {
    pub fn new() -> Self {
        Self {
            slots: SlotKey::ALL.map(OrderSlot::new),
        }
    }

    pub fn get(&self, key: SlotKey) -> &OrderSlot {
        &self.slots[key.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderSlot> {
        self.slots.iter()
    }

    pub fn is_pending(&self, key: SlotKey) -> bool {
        self.get(key).pending
    }

    /// Run the guard sequence and place (or re-place) the entry for `key`.
    pub async fn place<G: OrderGateway + ?Sized>(
        &mut self,
        key: SlotKey,
        ctx: &PlaceContext,
        gateway: &G,
    ) -> PlaceOutcome {
        if ctx.mode != HostMode::Live {
            return reject(key, Rejection::NotLive);
        }
        if ctx.position_active {
            return reject(key, Rejection::PositionActive);
        }
        match ctx.reported_position {
            None => {
                return reject(
                    key,
                    Rejection::PositionUnknown("gateway position unavailable".to_string()),
                )
            }
            Some(report) if !report.is_flat() => return reject(key, Rejection::PositionActive),
            Some(_) => {}
        }
        let Some(level) = ctx.stable_level else {
            return reject(key, Rejection::LevelUnavailable(key.level));
        };
        let Some(price) = ctx.market_price else {
            return reject(key, Rejection::NoMarketPrice);
        };
        let plan = match entry_rule(key, level, price) {
            Ok(plan) => plan,
            Err(rejection) => return reject(key, rejection),
        };

        let slot = self.get(key);
        let replacing = slot.pending;
        if let Some(order) = slot.order.as_ref().filter(|_| slot.pending) {
            if order.order_type == plan.order_type && approx_eq(order.price, level, ctx.eps) {
                debug!(slot = %key, %level, order_type = %plan.order_type, "Entry already placed at level");
                return PlaceOutcome::AlreadyPlaced;
            }
        }

        if replacing {
            self.cancel(key, gateway).await;
        }

        let request = OrderRequest::resting(
            key.direction.entry_action(),
            plan.order_type,
            ctx.quantity,
            level,
            key.order_name(),
        );

        match gateway.submit(request).await {
            Ok(handle) => {
                let slot = &mut self.slots[key.index()];
                slot.pending = true;
                slot.order = Some(TrackedOrder {
                    handle: handle.clone(),
                    order_type: plan.order_type,
                    price: level,
                    state: OrderState::Submitted,
                });
                info!(
                    slot = %key,
                    order_type = %plan.order_type,
                    style = plan.style,
                    %level,
                    quantity = %ctx.quantity,
                    %handle,
                    replaced = replacing,
                    "Entry order placed"
                );
                let cancelled = self.cancel_direction(key.direction.opposite(), gateway).await;
                if cancelled > 0 {
                    debug!(slot = %key, cancelled, "Cancelled opposite-direction entries");
                }
                if replacing {
                    PlaceOutcome::Replaced {
                        handle,
                        order_type: plan.order_type,
                        price: level,
                    }
                } else {
                    PlaceOutcome::Submitted {
                        handle,
                        order_type: plan.order_type,
                        price: level,
                    }
                }
            }
            Err(e) => {
                error!(slot = %key, error = %e, "Entry submission failed, slot left clear");
                PlaceOutcome::SubmitFailed(e)
            }
        }
    }

    /// Cancel the slot's order if it is still live, then clear the slot.
    ///
    /// Returns whether the slot held anything.
    pub async fn cancel<G: OrderGateway + ?Sized>(&mut self, key: SlotKey, gateway: &G) -> bool {
        let slot = &mut self.slots[key.index()];
        let held = slot.pending || slot.order.is_some();

        if let Some(order) = slot.order.take() {
            if order.state.is_cancelable() {
                if let Err(e) = gateway.cancel(&order.handle).await {
                    debug!(slot = %key, handle = %order.handle, error = %e, "Cancel request failed");
                }
            }
        }
        slot.pending = false;
        held
    }

    /// Cancel every slot of one direction. Returns how many held an order.
    pub async fn cancel_direction<G: OrderGateway + ?Sized>(
        &mut self,
        direction: Direction,
        gateway: &G,
    ) -> usize {
        let mut count = 0;
        for key in SlotKey::ALL.into_iter().filter(|k| k.direction == direction) {
            if self.cancel(key, gateway).await {
                count += 1;
            }
        }
        count
    }

    /// Cancel all six slots.
    pub async fn cancel_all<G: OrderGateway + ?Sized>(&mut self, gateway: &G) -> usize {
        self.cancel_direction(Direction::Buy, gateway).await
            + self.cancel_direction(Direction::Sell, gateway).await
    }

    /// Forget all slot state without contacting the gateway.
    pub fn clear_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.clear();
        }
    }

    /// Route a gateway callback to the slot named in it.
    pub fn on_order_update(&mut self, update: &OrderUpdate) -> SlotUpdate {
        let Some(key) = SlotKey::from_order_name(&update.name) else {
            return SlotUpdate::NotEntry;
        };
        let slot = &mut self.slots[key.index()];

        let Some(order) = slot.order.as_mut().filter(|o| o.handle == update.handle) else {
            if update.state == OrderState::Filled {
                warn!(
                    slot = %key,
                    handle = %update.handle,
                    "Entry filled after its slot was cleared; no bracket will be created"
                );
            } else {
                debug!(slot = %key, handle = %update.handle, state = ?update.state, "Ignoring stale entry callback");
            }
            return SlotUpdate::Stale(key);
        };

        match update.state {
            OrderState::Submitted | OrderState::Accepted | OrderState::Working => {
                order.state = update.state;
                SlotUpdate::Tracked(key)
            }
            OrderState::Rejected => {
                warn!(
                    slot = %key,
                    handle = %update.handle,
                    error = update.error.as_deref().unwrap_or("unknown"),
                    "Entry order rejected. Strategy continues running."
                );
                slot.clear();
                SlotUpdate::Cleared(key)
            }
            OrderState::Cancelled => {
                debug!(slot = %key, handle = %update.handle, "Entry order cancelled");
                slot.clear();
                SlotUpdate::Cleared(key)
            }
            OrderState::Filled => {
                let price = update.fill_price.unwrap_or(order.price);
                let quantity = update.filled_qty;
                slot.clear();
                SlotUpdate::Filled {
                    key,
                    price,
                    quantity,
                }
            }
        }
    }
}

fn reject(key: SlotKey, rejection: Rejection) -> PlaceOutcome {
    warn!(slot = %key, reason = %rejection, "Entry placement rejected");
    PlaceOutcome::Rejected(rejection)
}
