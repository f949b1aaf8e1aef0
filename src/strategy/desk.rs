//! The strategy instance: owns every piece of mutable state and handles one
//! event at a time.

use super::bracket::{bracket_id, BracketParams, BracketPlan};
use super::commands::Command;
use super::lifecycle::{CloseOutcome, ExitEvent, Position};
use super::slots::{PlaceContext, PlaceOutcome, SlotBook, SlotUpdate};
use super::snapshot::{LevelView, PositionView, SlotView, StateObserver, StrategySnapshot};
use super::stability::{RawLevels, StabilityFilter};
use super::types::{HostMode, Level, MarketUpdate, SlotKey};
use crate::config::StrategyConfig;
use crate::exchange::{OrderGateway, OrderUpdate};
use crate::utils::price_epsilon;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Strategy parameters resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub quantity: Decimal,
    pub bars_required_to_trade: u64,
    pub bracket: BracketParams,
}

impl From<&StrategyConfig> for StrategySettings {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            quantity: config.quantity,
            bars_required_to_trade: config.bars_required_to_trade,
            bracket: BracketParams {
                target_multiplier: config.target_multiplier,
                stop_multiplier: config.stop_multiplier,
            },
        }
    }
}

/// Everything the strategy reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyEvent {
    Market(MarketUpdate),
    Order(OrderUpdate),
    Command(Command),
    ClosePosition,
    CancelAll,
    ModeChanged(HostMode),
    /// Force an observer refresh and log the current state
    Status,
    Shutdown,
}

/// Donchian channel entry desk.
pub struct DonchianStrategy<G: OrderGateway> {
    settings: StrategySettings,
    gateway: Arc<G>,
    mode: HostMode,
    stability: StabilityFilter,
    slots: SlotBook,
    position: Position,
    last_close: Option<Decimal>,
    last_atr: Decimal,
    tick_size: Option<Decimal>,
    bars_seen: u64,
    bracket_seq: u64,
    observers: Vec<Arc<dyn StateObserver>>,
    /// Set by any state change; cleared when observers are refreshed
    dirty: bool,
}

impl<G: OrderGateway> DonchianStrategy<G> {
    pub fn new(settings: StrategySettings, gateway: Arc<G>) -> Self {
        Self {
            settings,
            gateway,
            mode: HostMode::default(),
            stability: StabilityFilter::new(),
            slots: SlotBook::new(),
            position: Position::default(),
            last_close: None,
            last_atr: Decimal::ZERO,
            tick_size: None,
            bars_seen: 0,
            bracket_seq: 0,
            observers: Vec::new(),
            dirty: false,
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn mode(&self) -> HostMode {
        self.mode
    }

    pub fn slots(&self) -> &SlotBook {
        &self.slots
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn stability(&self) -> &StabilityFilter {
        &self.stability
    }

    /// Price tolerance for the current instrument.
    pub fn eps(&self) -> Decimal {
        price_epsilon(self.tick_size.unwrap_or_default())
    }

    /// Process one event to completion, then refresh observers if anything
    /// changed.
    pub async fn handle_event(&mut self, event: StrategyEvent) -> Result<()> {
        let result = match event {
            StrategyEvent::Market(update) => self.on_market_update(update).await,
            StrategyEvent::Order(update) => {
                self.on_order_update(update).await;
                Ok(())
            }
            StrategyEvent::Command(command) => {
                self.on_command(command).await;
                Ok(())
            }
            StrategyEvent::ClosePosition => {
                self.close_position().await;
                Ok(())
            }
            StrategyEvent::CancelAll => {
                self.cancel_all().await;
                Ok(())
            }
            StrategyEvent::ModeChanged(mode) => {
                self.set_mode(mode);
                Ok(())
            }
            StrategyEvent::Status => {
                self.log_status();
                Ok(())
            }
            StrategyEvent::Shutdown => {
                self.shutdown().await;
                Ok(())
            }
        };

        self.notify_if_dirty();
        result
    }

    /// Per-update driver: flatten check first, then level stabilization.
    async fn on_market_update(&mut self, update: MarketUpdate) -> Result<()> {
        anyhow::ensure!(
            update.tick_size > Decimal::ZERO,
            "non-positive tick size {}",
            update.tick_size
        );

        self.bars_seen += 1;
        if self.bars_seen <= self.settings.bars_required_to_trade {
            return Ok(());
        }

        self.tick_size = Some(update.tick_size);
        self.last_close = Some(update.close);
        self.last_atr = update.atr;

        if self.mode == HostMode::Live && self.position.is_active() {
            let reset = self
                .position
                .check_flat(&mut self.slots, &*self.gateway)
                .await
                .context("position check failed")?;
            if reset {
                self.dirty = true;
            }
        }

        let raw = RawLevels {
            upper: update.upper,
            mean: update.mean,
            lower: update.lower,
        };
        if !self.stability.update(raw, self.eps()).is_empty() {
            self.dirty = true;
        }
        Ok(())
    }

    async fn on_order_update(&mut self, update: OrderUpdate) {
        match self.slots.on_order_update(&update) {
            SlotUpdate::NotEntry => {
                match self.position.on_exit_update(&update, &*self.gateway).await {
                    ExitEvent::Unrelated => {
                        debug!(handle = %update.handle, name = %update.name, state = ?update.state, "Callback for untracked order");
                    }
                    ExitEvent::Updated(_) => {}
                    ExitEvent::Closed { .. } => self.dirty = true,
                }
            }
            SlotUpdate::Stale(_) => {}
            SlotUpdate::Tracked(_) | SlotUpdate::Cleared(_) => self.dirty = true,
            SlotUpdate::Filled {
                key,
                price,
                quantity,
            } => {
                self.dirty = true;
                self.on_entry_filled(key, price, quantity).await;
            }
        }
    }

    /// Hand a qualifying entry fill to the bracket creator.
    async fn on_entry_filled(&mut self, key: SlotKey, price: Decimal, quantity: Decimal) {
        info!(slot = %key, %price, %quantity, "Entry filled");

        if !self.position.can_open() {
            debug!(slot = %key, "Position already active, no new bracket");
            return;
        }
        let Some(tick_size) = self.tick_size else {
            error!(slot = %key, "Entry filled before any market update, cannot size bracket");
            return;
        };
        let quantity = if quantity > Decimal::ZERO {
            quantity
        } else {
            self.settings.quantity
        };

        let plan = BracketPlan::compute(
            key.direction.into(),
            price,
            quantity,
            self.last_atr,
            tick_size,
            &self.settings.bracket,
        );
        self.bracket_seq += 1;
        let id = bracket_id(self.bracket_seq);
        self.position
            .open(&plan, id, &mut self.slots, &*self.gateway)
            .await;
    }

    async fn on_command(&mut self, command: Command) {
        let key = command.slot();
        if command.is_place() {
            self.place(key).await;
        } else {
            self.cancel(key).await;
        }
    }

    /// Place or update the entry for one slot.
    pub async fn place(&mut self, key: SlotKey) -> PlaceOutcome {
        let reported_position = if self.mode == HostMode::Live && !self.position.is_active() {
            match self.gateway.position().await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(slot = %key, error = %e, "Position query failed");
                    None
                }
            }
        } else {
            None
        };

        let ctx = PlaceContext {
            mode: self.mode,
            position_active: self.position.is_active(),
            reported_position,
            stable_level: self.stability.stable(key.level),
            market_price: self.last_close,
            eps: self.eps(),
            quantity: self.settings.quantity,
        };

        let outcome = self.slots.place(key, &ctx, &*self.gateway).await;
        if outcome.is_placed() {
            self.dirty = true;
        }
        outcome
    }

    /// Cancel one slot. Only acts in live mode.
    pub async fn cancel(&mut self, key: SlotKey) -> bool {
        if self.mode != HostMode::Live {
            warn!(slot = %key, "Cancel ignored outside live mode");
            return false;
        }
        let cancelled = self.slots.cancel(key, &*self.gateway).await;
        if cancelled {
            info!(slot = %key, "Entry cancelled");
            self.dirty = true;
        } else {
            debug!(slot = %key, "Nothing to cancel");
        }
        cancelled
    }

    /// Cancel every entry slot, leaving the position alone.
    pub async fn cancel_all(&mut self) -> usize {
        let cancelled = self.slots.cancel_all(&*self.gateway).await;
        if cancelled > 0 {
            info!(cancelled, "All entry orders cancelled");
            self.dirty = true;
        }
        cancelled
    }

    /// Close the active position at market.
    pub async fn close_position(&mut self) -> CloseOutcome {
        let outcome = self
            .position
            .close(
                self.mode,
                self.settings.quantity,
                &mut self.slots,
                &*self.gateway,
            )
            .await;
        if matches!(
            outcome,
            CloseOutcome::Closed { .. } | CloseOutcome::AlreadyFlat
        ) {
            self.dirty = true;
        }
        outcome
    }

    pub fn set_mode(&mut self, mode: HostMode) {
        if self.mode != mode {
            info!(from = ?self.mode, to = ?mode, "Host mode changed");
            self.mode = mode;
            self.dirty = true;
        }
    }

    /// Cancel all entries and flatten any position.
    pub async fn shutdown(&mut self) {
        info!("Strategy shutting down");
        self.cancel_all().await;
        if self.position.is_active() {
            self.close_position().await;
        }
    }

    fn log_status(&mut self) {
        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(snapshot = %json, "Strategy status"),
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }
        self.dirty = true;
    }

    /// Read-only view of the current state.
    pub fn snapshot(&self) -> StrategySnapshot {
        let levels = Level::ALL.map(|level| LevelView {
            level,
            stable: self.stability.stable(level),
        });
        let slots = self
            .slots
            .iter()
            .map(|slot| SlotView {
                key: slot.key,
                pending: slot.pending,
                order_type: slot.order.as_ref().map(|o| o.order_type),
                price: slot.order.as_ref().map(|o| o.price),
            })
            .collect();
        let bracket = self.position.bracket();

        StrategySnapshot {
            mode: self.mode,
            last_price: self.last_close,
            levels,
            slots,
            position: PositionView {
                active: self.position.is_active(),
                side: self.position.side(),
                entry_price: self.position.entry_price(),
                bracket_id: bracket.map(|b| b.id.clone()),
                target_price: bracket.map(|b| b.target.price),
                stop_price: bracket.map(|b| b.stop.price),
            },
        }
    }

    fn notify_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in &self.observers {
            observer.refresh(&snapshot);
        }
    }
}
