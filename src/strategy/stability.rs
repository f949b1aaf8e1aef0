//! Debounced channel levels.
//!
//! A raw channel line only becomes the stable level after it has repeated
//! (within epsilon) for several consecutive updates. A stable value of zero
//! means no level has settled yet and blocks every placement.

use super::types::Level;
use crate::utils::approx_eq;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// Consecutive matching observations required before a line is accepted.
pub const STABLE_RUN_LENGTH: u32 = 3;

/// Raw channel values for one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLevels {
    pub upper: Decimal,
    pub mean: Decimal,
    pub lower: Decimal,
}

/// Debounce state of a single line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StableLevel {
    pub last_seen: Decimal,
    pub stable_value: Decimal,
    pub run_length: u32,
}

impl StableLevel {
    /// Feed one raw observation. Returns the new stable value when it changes.
    pub fn observe(&mut self, current: Decimal, eps: Decimal) -> Option<Decimal> {
        if approx_eq(current, self.last_seen, eps) {
            self.run_length = self.run_length.saturating_add(1);
        } else {
            self.run_length = 1;
        }
        self.last_seen = current;

        if self.run_length >= STABLE_RUN_LENGTH && (self.stable_value - current).abs() > eps {
            self.stable_value = current;
            return Some(current);
        }
        None
    }

    /// The stable value, or `None` while nothing has settled.
    pub fn available(&self) -> Option<Decimal> {
        if self.stable_value.is_zero() {
            None
        } else {
            Some(self.stable_value)
        }
    }
}

/// A stable level that moved during an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelChange {
    pub level: Level,
    pub value: Decimal,
    pub run_length: u32,
}

/// Stable level tracking for the upper, mean and lower lines.
#[derive(Debug, Clone, Default)]
pub struct StabilityFilter {
    upper: StableLevel,
    mean: StableLevel,
    lower: StableLevel,
}

impl StabilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one raw update for all three lines independently.
    pub fn update(&mut self, raw: RawLevels, eps: Decimal) -> Vec<LevelChange> {
        let mut changes = Vec::new();
        for (level, current) in [
            (Level::Upper, raw.upper),
            (Level::Mean, raw.mean),
            (Level::Lower, raw.lower),
        ] {
            let line = self.line_mut(level);
            if let Some(value) = line.observe(current, eps) {
                info!(
                    %level,
                    %value,
                    run_length = line.run_length,
                    "Stable level updated"
                );
                changes.push(LevelChange {
                    level,
                    value,
                    run_length: line.run_length,
                });
            }
        }
        changes
    }

    pub fn line(&self, level: Level) -> &StableLevel {
        match level {
            Level::Upper => &self.upper,
            Level::Mean => &self.mean,
            Level::Lower => &self.lower,
        }
    }

    fn line_mut(&mut self, level: Level) -> &mut StableLevel {
        match level {
            Level::Upper => &mut self.upper,
            Level::Mean => &mut self.mean,
            Level::Lower => &mut self.lower,
        }
    }

    /// Stable value for `level`, `None` if not yet available.
    pub fn stable(&self, level: Level) -> Option<Decimal> {
        self.line(level).available()
    }
}
