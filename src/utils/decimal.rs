//! Decimal arithmetic utilities for tick-based price calculations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Smallest tolerance ever used for price comparisons.
pub const MIN_PRICE_EPSILON: Decimal = dec!(0.000001);

/// Price tolerance derived from the instrument tick size.
///
/// `max(0.000001, tick_size * 0.25)`
pub fn price_epsilon(tick_size: Decimal) -> Decimal {
    (tick_size * dec!(0.25)).max(MIN_PRICE_EPSILON)
}

/// True when two prices are strictly closer than `eps`.
pub fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
    (a - b).abs() < eps
}

/// Round down to a whole number of ticks.
pub fn floor_to_tick(value: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return value;
    }
    (value / tick_size).floor() * tick_size
}

/// Number of whole ticks contained in `value` (rounded down).
pub fn whole_ticks(value: Decimal, tick_size: Decimal) -> u32 {
    if tick_size <= Decimal::ZERO || value <= Decimal::ZERO {
        return 0;
    }
    (value / tick_size).floor().to_u32().unwrap_or(u32::MAX)
}
