//! Paper trading gateway for replay and local testing.
//!
//! Orders rest in memory and are matched against each replayed close price.
//! Every state transition is reported through the update channel, never as
//! a return value, so the strategy sees the same asynchronous flow a live
//! host would produce.

use super::traits::{GatewayError, OrderGateway};
use super::types::*;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// A simulated order resting in the paper book.
#[derive(Debug, Clone)]
pub struct PaperOrder {
    pub handle: OrderHandle,
    pub request: OrderRequest,
    pub state: OrderState,
}

/// Simulated account state.
#[derive(Debug, Default)]
pub struct PaperState {
    /// Orders keyed by submission sequence so matching is deterministic
    pub orders: BTreeMap<u64, PaperOrder>,
    /// Signed net position
    pub position: Decimal,
    pub last_price: Option<Decimal>,
    pub order_count: u64,
    pub fill_count: u64,
}

/// Summary counters for status output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperStats {
    pub position: Decimal,
    pub working_orders: usize,
    pub order_count: u64,
    pub fill_count: u64,
}

/// Paper gateway that simulates the host's order routing.
#[derive(Clone)]
pub struct PaperGateway {
    state: Arc<RwLock<PaperState>>,
    order_id_counter: Arc<AtomicU64>,
    updates: mpsc::UnboundedSender<OrderUpdate>,
    supports_oco: bool,
}

impl PaperGateway {
    /// Create a paper gateway reporting order callbacks on `updates`.
    pub fn new(updates: mpsc::UnboundedSender<OrderUpdate>, supports_oco: bool) -> Self {
        Self {
            state: Arc::new(RwLock::new(PaperState::default())),
            order_id_counter: Arc::new(AtomicU64::new(1)),
            updates,
            supports_oco,
        }
    }

    fn next_order_id(&self) -> u64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn emit(&self, update: OrderUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Paper gateway update dropped, receiver closed");
        }
    }

    /// Current counters.
    pub async fn stats(&self) -> PaperStats {
        let state = self.state.read().await;
        PaperStats {
            position: state.position,
            working_orders: state
                .orders
                .values()
                .filter(|o| o.state.is_cancelable())
                .count(),
            order_count: state.order_count,
            fill_count: state.fill_count,
        }
    }

    /// Look up an order by handle.
    pub async fn order(&self, handle: &OrderHandle) -> Option<PaperOrder> {
        let state = self.state.read().await;
        state.orders.values().find(|o| &o.handle == handle).cloned()
    }

    /// Match working orders against a new traded price.
    ///
    /// Returns the number of orders filled.
    pub async fn on_price(&self, price: Decimal) -> usize {
        let mut state = self.state.write().await;
        state.last_price = Some(price);

        let triggered: Vec<u64> = state
            .orders
            .iter()
            .filter(|(_, o)| o.state == OrderState::Working && is_triggered(&o.request, price))
            .map(|(id, _)| *id)
            .collect();

        let mut filled = 0;
        for id in triggered {
            // An earlier fill in this pass may have cancelled this order via OCO
            let Some(order) = state.orders.get_mut(&id) else {
                continue;
            };
            if order.state != OrderState::Working {
                continue;
            }

            order.state = OrderState::Filled;
            let fill_price = match order.request.order_type {
                OrderType::Limit => order.request.limit_price.unwrap_or(price),
                OrderType::StopMarket | OrderType::Market => price,
            };
            let quantity = order.request.quantity;
            let signed = if order.request.action.is_buy() {
                quantity
            } else {
                -quantity
            };
            let handle = order.handle.clone();
            let name = order.request.name.clone();
            let group = order.request.oco_group.clone();

            state.position += signed;
            state.fill_count += 1;
            filled += 1;

            info!(
                %handle,
                %name,
                fill_price = %fill_price,
                %quantity,
                position = %state.position,
                "Paper order filled"
            );
            self.emit(OrderUpdate::filled(handle.clone(), name, fill_price, quantity));

            if self.supports_oco {
                if let Some(group) = group {
                    for sibling in state.orders.values_mut() {
                        if sibling.handle != handle
                            && sibling.request.oco_group.as_deref() == Some(group.as_str())
                            && sibling.state.is_cancelable()
                        {
                            sibling.state = OrderState::Cancelled;
                            debug!(handle = %sibling.handle, %group, "OCO sibling cancelled");
                            self.emit(OrderUpdate::status(
                                sibling.handle.clone(),
                                sibling.request.name.clone(),
                                OrderState::Cancelled,
                            ));
                        }
                    }
                }
            }
        }

        filled
    }
}

fn is_triggered(request: &OrderRequest, price: Decimal) -> bool {
    let buy = request.action.is_buy();
    match (request.order_type, request.working_price()) {
        (OrderType::Limit, Some(limit)) if buy => price <= limit,
        (OrderType::Limit, Some(limit)) => price >= limit,
        (OrderType::StopMarket, Some(stop)) if buy => price >= stop,
        (OrderType::StopMarket, Some(stop)) => price <= stop,
        _ => false,
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit(&self, request: OrderRequest) -> Result<OrderHandle, GatewayError> {
        let id = self.next_order_id();
        let handle = OrderHandle::new(format!("paper-{}", id));
        let mut state = self.state.write().await;
        state.order_count += 1;

        self.emit(OrderUpdate::status(
            handle.clone(),
            request.name.clone(),
            OrderState::Submitted,
        ));

        let invalid = if request.quantity <= Decimal::ZERO {
            Some("quantity must be positive".to_string())
        } else if request.order_type != OrderType::Market && request.working_price().is_none() {
            Some(format!("{} order without a price", request.order_type))
        } else if request.order_type == OrderType::Market && state.last_price.is_none() {
            Some("no market price to fill against".to_string())
        } else {
            None
        };

        if let Some(reason) = invalid {
            warn!(%handle, name = %request.name, %reason, "Paper order rejected");
            self.emit(OrderUpdate::rejected(handle.clone(), request.name.clone(), reason));
            state.orders.insert(
                id,
                PaperOrder {
                    handle: handle.clone(),
                    request,
                    state: OrderState::Rejected,
                },
            );
            return Ok(handle);
        }

        if request.order_type == OrderType::Market {
            let price = state.last_price.unwrap_or_default();
            let signed = if request.action.is_buy() {
                request.quantity
            } else {
                -request.quantity
            };
            state.position += signed;
            state.fill_count += 1;
            info!(
                %handle,
                name = %request.name,
                fill_price = %price,
                quantity = %request.quantity,
                position = %state.position,
                "Paper market order filled"
            );
            self.emit(OrderUpdate::filled(
                handle.clone(),
                request.name.clone(),
                price,
                request.quantity,
            ));
            state.orders.insert(
                id,
                PaperOrder {
                    handle: handle.clone(),
                    request,
                    state: OrderState::Filled,
                },
            );
            return Ok(handle);
        }

        self.emit(OrderUpdate::status(
            handle.clone(),
            request.name.clone(),
            OrderState::Accepted,
        ));
        self.emit(OrderUpdate::status(
            handle.clone(),
            request.name.clone(),
            OrderState::Working,
        ));
        debug!(
            %handle,
            name = %request.name,
            order_type = %request.order_type,
            price = ?request.working_price(),
            "Paper order working"
        );
        state.orders.insert(
            id,
            PaperOrder {
                handle: handle.clone(),
                request,
                state: OrderState::Working,
            },
        );

        Ok(handle)
    }

    async fn cancel(&self, handle: &OrderHandle) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .values_mut()
            .find(|o| &o.handle == handle)
            .ok_or_else(|| GatewayError::UnknownOrder(handle.clone()))?;

        if !order.state.is_cancelable() {
            return Err(GatewayError::NotCancelable {
                handle: handle.clone(),
                state: order.state,
            });
        }

        order.state = OrderState::Cancelled;
        let name = order.request.name.clone();
        debug!(%handle, %name, "Paper order cancelled");
        self.emit(OrderUpdate::status(handle.clone(), name, OrderState::Cancelled));
        Ok(())
    }

    async fn position(&self) -> Result<PositionReport, GatewayError> {
        Ok(PositionReport {
            quantity: self.state.read().await.position,
        })
    }

    fn supports_oco(&self) -> bool {
        self.supports_oco
    }
}
