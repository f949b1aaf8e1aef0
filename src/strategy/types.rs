//! Core vocabulary: slot keys, host mode, position side, market updates.

use crate::exchange::OrderAction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entry direction of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// Host action that opens a position in this direction.
    pub fn entry_action(&self) -> OrderAction {
        match self {
            Direction::Buy => OrderAction::Buy,
            Direction::Sell => OrderAction::SellShort,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "Buy"),
            Direction::Sell => write!(f, "Sell"),
        }
    }
}

/// Channel line a slot is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Upper,
    Mean,
    Lower,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Upper, Level::Mean, Level::Lower];
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Upper => write!(f, "Upper"),
            Level::Mean => write!(f, "Mean"),
            Level::Lower => write!(f, "Lower"),
        }
    }
}

/// Identifies one of the six entry slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub direction: Direction,
    pub level: Level,
}

impl SlotKey {
    pub const fn new(direction: Direction, level: Level) -> Self {
        Self { direction, level }
    }

    pub const ALL: [SlotKey; 6] = [
        SlotKey::new(Direction::Buy, Level::Upper),
        SlotKey::new(Direction::Sell, Level::Upper),
        SlotKey::new(Direction::Buy, Level::Mean),
        SlotKey::new(Direction::Sell, Level::Mean),
        SlotKey::new(Direction::Buy, Level::Lower),
        SlotKey::new(Direction::Sell, Level::Lower),
    ];

    /// Position of this key in [`SlotKey::ALL`].
    pub fn index(&self) -> usize {
        let level = match self.level {
            Level::Upper => 0,
            Level::Mean => 1,
            Level::Lower => 2,
        };
        let direction = match self.direction {
            Direction::Buy => 0,
            Direction::Sell => 1,
        };
        level * 2 + direction
    }

    /// Order name used to route gateway callbacks back to the slot.
    pub fn order_name(&self) -> &'static str {
        match (self.direction, self.level) {
            (Direction::Buy, Level::Upper) => "BuyUpperEntry",
            (Direction::Sell, Level::Upper) => "SellUpperEntry",
            (Direction::Buy, Level::Mean) => "BuyMeanEntry",
            (Direction::Sell, Level::Mean) => "SellMeanEntry",
            (Direction::Buy, Level::Lower) => "BuyLowerEntry",
            (Direction::Sell, Level::Lower) => "SellLowerEntry",
        }
    }

    /// Reverse of [`SlotKey::order_name`].
    pub fn from_order_name(name: &str) -> Option<SlotKey> {
        SlotKey::ALL.into_iter().find(|k| k.order_name() == name)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction, self.level)
    }
}

/// Whether the host is replaying history or trading live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HostMode {
    #[default]
    Historical,
    Live,
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Host action that closes a position on this side.
    pub fn closing_action(&self) -> OrderAction {
        match self {
            PositionSide::Long => OrderAction::Sell,
            PositionSide::Short => OrderAction::BuyToCover,
        }
    }
}

impl From<Direction> for PositionSide {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => PositionSide::Long,
            Direction::Sell => PositionSide::Short,
        }
    }
}

/// One market/indicator update from the data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketUpdate {
    pub upper: Decimal,
    pub mean: Decimal,
    pub lower: Decimal,
    pub close: Decimal,
    pub atr: Decimal,
    pub tick_size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_key_index_matches_table() {
        for (i, key) in SlotKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
        }
    }

    #[test]
    fn test_order_name_round_trip() {
        for key in SlotKey::ALL {
            assert_eq!(SlotKey::from_order_name(key.order_name()), Some(key));
        }
        assert_eq!(SlotKey::from_order_name("ProfitTarget"), None);
    }

    #[test]
    fn test_actions() {
        assert_eq!(Direction::Sell.entry_action(), OrderAction::SellShort);
        assert_eq!(PositionSide::from(Direction::Buy), PositionSide::Long);
        assert_eq!(PositionSide::Short.closing_action(), OrderAction::BuyToCover);
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
    }
}
