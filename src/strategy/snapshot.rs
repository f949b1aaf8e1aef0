//! Read-only state views handed to observers.

use super::types::{HostMode, Level, PositionSide, SlotKey};
use crate::exchange::OrderType;
use rust_decimal::Decimal;
use serde::Serialize;

/// One slot as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub key: SlotKey,
    pub pending: bool,
    pub order_type: Option<OrderType>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionView {
    pub active: bool,
    pub side: Option<PositionSide>,
    pub entry_price: Option<Decimal>,
    pub bracket_id: Option<String>,
    pub target_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

/// Stable level of one line, `None` while unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelView {
    pub level: Level,
    pub stable: Option<Decimal>,
}

/// Everything an observer may read after a state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySnapshot {
    pub mode: HostMode,
    pub last_price: Option<Decimal>,
    pub levels: [LevelView; 3],
    pub slots: Vec<SlotView>,
    pub position: PositionView,
}

impl StrategySnapshot {
    pub fn slot(&self, key: SlotKey) -> Option<&SlotView> {
        self.slots.iter().find(|s| s.key == key)
    }

    pub fn stable(&self, level: Level) -> Option<Decimal> {
        self.levels
            .iter()
            .find(|l| l.level == level)
            .and_then(|l| l.stable)
    }
}

/// Refresh hook for presentation layers.
pub trait StateObserver: Send + Sync {
    fn refresh(&self, snapshot: &StrategySnapshot);
}
