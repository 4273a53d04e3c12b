//! Decimal tolerance helpers for quantity and money comparisons.
//!
//! Quantities are fractional (tons to four decimal places) and money amounts
//! round to cents, so equality checks across documents always go through a
//! tolerance instead of exact comparison.

use rust_decimal::Decimal;

/// Quantity comparison tolerance: 0.0001.
pub const QTY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Money comparison tolerance: 0.01.
pub const PAYMENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// True when `a` and `b` differ by no more than `tolerance`.
pub fn approx_eq(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// True when `value` is within `tolerance` of zero.
pub fn approx_zero(value: Decimal, tolerance: Decimal) -> bool {
    value.abs() <= tolerance
}

/// Floor a balance at zero (ledger balances are never negative).
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    if value < Decimal::ZERO { Decimal::ZERO } else { value }
}
