//! Shared utilities.

pub mod decimal;

pub use decimal::{approx_eq, floor_to_tick, price_epsilon, whole_ticks};
