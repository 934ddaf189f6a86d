//! Adaptive-precision rounding
//!
//! Prices and percentages span many orders of magnitude, so the number of
//! decimal places grows as the magnitude shrinks.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places for a YT price of the given magnitude
pub fn price_decimals(value: f64) -> u32 {
    match value.abs() {
        v if v >= 1.0 => 3,
        v if v >= 0.1 => 4,
        v if v >= 0.01 => 5,
        v if v >= 0.001 => 6,
        v if v >= 0.0001 => 7,
        _ => 8,
    }
}

/// Decimal places for a percentage of the given magnitude
pub fn percentage_decimals(value: f64) -> u32 {
    match value.abs() {
        v if v >= 0.1 => 2,
        v if v >= 0.01 => 3,
        v if v >= 0.001 => 4,
        v if v >= 0.0001 => 5,
        _ => 6,
    }
}

/// Round half away from zero to `dp` places. Non-finite input yields `None`.
pub fn round_dp(value: f64, dp: u32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let dec = Decimal::from_f64(value)?;
    dec.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
}

pub fn format_yt_price(value: Option<f64>) -> Option<f64> {
    value.and_then(|v| round_dp(v, price_decimals(v)))
}

pub fn format_percentage(value: Option<f64>) -> Option<f64> {
    value.and_then(|v| round_dp(v, percentage_decimals(v)))
}
