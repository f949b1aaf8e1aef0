//! Console rendering of the six-button control panel.
//!
//! Works from [`StrategySnapshot`] alone: each slot shows a place button
//! ("BUY UPPER", or "UPDATE UPPER" while pending) and a cancel button that
//! is only visible for pending slots. Everything is disabled while a
//! position is open.

use crate::strategy::{PositionSide, SlotKey, StateObserver, StrategySnapshot};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

/// Rendered state of one slot's buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotButtons {
    pub key: SlotKey,
    pub label: String,
    pub enabled: bool,
    pub cancel_visible: bool,
    pub cancel_enabled: bool,
}

/// Full panel for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub buttons: Vec<SlotButtons>,
    pub status: String,
}

pub fn render(snapshot: &StrategySnapshot) -> PanelView {
    let has_position = snapshot.position.active;

    let buttons = snapshot
        .slots
        .iter()
        .map(|slot| {
            let level = slot.key.level.to_string().to_uppercase();
            let label = if slot.pending {
                format!("UPDATE {}", level)
            } else {
                format!("{} {}", slot.key.direction.to_string().to_uppercase(), level)
            };
            SlotButtons {
                key: slot.key,
                label,
                enabled: !has_position,
                cancel_visible: slot.pending,
                cancel_enabled: !has_position,
            }
        })
        .collect();

    let status = match (has_position, snapshot.position.side) {
        (true, Some(PositionSide::Long)) => "LONG".to_string(),
        (true, Some(PositionSide::Short)) => "SHORT".to_string(),
        (true, None) => "IN POSITION".to_string(),
        (false, _) => "FLAT".to_string(),
    };

    PanelView { buttons, status }
}

/// Observer that logs the panel whenever it changes.
#[derive(Debug, Default)]
pub struct ConsolePanel {
    last: Mutex<Option<PanelView>>,
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently rendered view.
    pub fn current(&self) -> Option<PanelView> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateObserver for ConsolePanel {
    fn refresh(&self, snapshot: &StrategySnapshot) {
        let view = render(snapshot);

        let levels: Vec<String> = snapshot
            .levels
            .iter()
            .map(|l| match l.stable {
                Some(value) => format!("{}={}", l.level, value),
                None => format!("{}=--", l.level),
            })
            .collect();
        info!(
            status = %view.status,
            mode = ?snapshot.mode,
            levels = %levels.join(" "),
            bracket = ?snapshot.position.bracket_id,
            "Panel"
        );
        for button in &view.buttons {
            let cancel = if button.cancel_visible { " [X]" } else { "" };
            let enabled = if button.enabled { "" } else { " (disabled)" };
            info!("   [{}]{}{}", button.label, cancel, enabled);
        }

        if let Ok(mut last) = self.last.lock() {
            *last = Some(view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderType;
    use crate::strategy::{
        Direction, HostMode, Level, LevelView, PositionView, SlotView,
    };
    use rust_decimal_macros::dec;

    fn snapshot(active: bool) -> StrategySnapshot {
        StrategySnapshot {
            mode: HostMode::Live,
            last_price: Some(dec!(100)),
            levels: Level::ALL.map(|level| LevelView {
                level,
                stable: None,
            }),
            slots: SlotKey::ALL
                .iter()
                .map(|key| {
                    let pending = *key == SlotKey::new(Direction::Sell, Level::Mean);
                    SlotView {
                        key: *key,
                        pending,
                        order_type: pending.then_some(OrderType::StopMarket),
                        price: pending.then_some(dec!(100)),
                    }
                })
                .collect(),
            position: PositionView {
                active,
                side: active.then_some(PositionSide::Short),
                entry_price: None,
                bracket_id: None,
                target_price: None,
                stop_price: None,
            },
        }
    }

    #[test]
    fn test_labels_and_cancel_visibility() {
        let view = render(&snapshot(false));

        assert_eq!(view.buttons[0].label, "BUY UPPER");
        assert!(!view.buttons[0].cancel_visible);
        // Sell Mean is pending
        assert_eq!(view.buttons[3].label, "UPDATE MEAN");
        assert!(view.buttons[3].cancel_visible);
        assert!(view.buttons.iter().all(|b| b.enabled));
        assert_eq!(view.status, "FLAT");
    }

    #[test]
    fn test_position_disables_everything() {
        let view = render(&snapshot(true));
        assert!(view.buttons.iter().all(|b| !b.enabled && !b.cancel_enabled));
        assert_eq!(view.status, "SHORT");
    }

    #[test]
    fn test_console_panel_keeps_last_view() {
        let panel = ConsolePanel::new();
        assert!(panel.current().is_none());
        panel.refresh(&snapshot(false));
        assert_eq!(panel.current().unwrap().buttons.len(), 6);
    }
}
