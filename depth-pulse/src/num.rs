//! Numeric text parsing and decimal rounding shared by the derivation modules.

use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};

/// Parse exchange price/quantity text into a finite `f64`.
///
/// Any text that parses to a finite float is accepted, including values beyond `Decimal`'s range
/// or precision. `NaN`, `inf` and other non-numeric text never survive.
pub(crate) fn parse_finite(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Round half away from zero to `dp` decimal places.
pub(crate) fn round_dp(value: f64, dp: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|decimal| decimal.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .and_then(decimal_to_f64)
        .unwrap_or(value)
}

/// Nearest `f64` to the decimal's exact text representation.
fn decimal_to_f64(decimal: Decimal) -> Option<f64> {
    decimal.to_string().parse().ok()
}
