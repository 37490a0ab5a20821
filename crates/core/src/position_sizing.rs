use crate::instrument::LotRules;
use rust_decimal::Decimal;

/// Floors `value` to a whole number of `step` increments.
///
/// A non-positive step leaves the value untouched.
#[must_use]
pub fn round_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

/// Converts a notional amount into an order size the gateway will accept.
///
/// # Arguments
/// * `amount_usd` - Configured notional for the instrument
/// * `price` - Quote side the order will be filled against
/// * `lot` - Minimum, step and maximum size for the instrument
///
/// # Returns
/// `amount_usd / price` floored to the lot step and clamped to `[min, max]`.
/// Falls back to the minimum lot when the price or amount is not positive.
#[must_use]
pub fn size_order(amount_usd: Decimal, price: Decimal, lot: &LotRules) -> Decimal {
    if price <= Decimal::ZERO || amount_usd <= Decimal::ZERO {
        return lot.min;
    }

    let raw = amount_usd / price;
    let stepped = round_to_step(raw, lot.step);

    let mut size = stepped.max(lot.min);
    if lot.max > Decimal::ZERO {
        size = size.min(lot.max);
    }
    size.normalize()
}
