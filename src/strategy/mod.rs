//! Trading strategy implementation.
//!
//! Contains the core logic for:
//! - Debouncing raw channel levels into stable levels
//! - Placing, replacing and cancelling entries in six slots
//! - Bracketing filled entries with ATR-scaled target and stop
//! - Tracking the position through to flat
//!
//! [`DonchianStrategy`] owns all of it and processes one [`StrategyEvent`]
//! at a time.

pub mod bracket;
mod commands;
mod desk;
pub mod lifecycle;
pub mod slots;
mod snapshot;
pub mod stability;
mod types;

pub use bracket::{BracketGroup, BracketParams, BracketPlan, ExitLeg, ExitRole};
pub use commands::{Command, OperatorInput, UnknownCommand};
pub use desk::{DonchianStrategy, StrategyEvent, StrategySettings};
pub use lifecycle::{CloseOutcome, Position};
pub use slots::{PlaceOutcome, Rejection, SlotBook};
pub use snapshot::{LevelView, PositionView, SlotView, StateObserver, StrategySnapshot};
pub use stability::{StabilityFilter, StableLevel};
pub use types::*;
