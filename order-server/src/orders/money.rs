//! Money calculation utilities using rust_decimal for precision
//!
//! All arithmetic happens on `Decimal`; values are converted back to `f64`
//! only for storage and serialization. Unit prices carry at most 2 decimal
//! places, so an order total is the exact sum of its lines.

use rust_decimal::prelude::*;
use shared::order::LineItem;

use super::error::LifecycleError;

/// Rounding strategy for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum decimal places of a unit price (whole cents)
const MAX_PRICE_SCALE: u32 = DECIMAL_PLACES;
/// Maximum allowed quantity per line
const MAX_QUANTITY: i32 = 9999;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), LifecycleError> {
    if !value.is_finite() {
        return Err(LifecycleError::InvalidPrice(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate one line item of a new order
pub fn validate_line_item(item: &LineItem) -> Result<(), LifecycleError> {
    if item.menu_item_id.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "menuItemId must not be empty".to_string(),
        ));
    }

    require_finite(item.price, "price")?;
    if item.price < 0.0 {
        return Err(LifecycleError::InvalidPrice(format!(
            "price must be non-negative, got {}",
            item.price
        )));
    }
    if item.price > MAX_PRICE {
        return Err(LifecycleError::InvalidPrice(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, item.price
        )));
    }
    if to_decimal(item.price).normalize().scale() > MAX_PRICE_SCALE {
        return Err(LifecycleError::InvalidPrice(format!(
            "price must have at most {} decimal places, got {}",
            MAX_PRICE_SCALE, item.price
        )));
    }

    if item.quantity <= 0 {
        return Err(LifecycleError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            item.quantity
        )));
    }
    if item.quantity > MAX_QUANTITY {
        return Err(LifecycleError::InvalidQuantity(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, item.quantity
        )));
    }

    Ok(())
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round_money(value).to_f64().unwrap_or_default()
}

/// Round to 2 decimal places, half away from zero
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `price * quantity` for one line
pub fn line_total(item: &LineItem) -> Decimal {
    to_decimal(item.price) * Decimal::from(item.quantity)
}

/// Sum of `price * quantity` over all lines
pub fn order_total(items: &[LineItem]) -> Decimal {
    items.iter().map(line_total).sum()
}

/// Compare two monetary amounts within [`MONEY_TOLERANCE`]
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() < MONEY_TOLERANCE
}
