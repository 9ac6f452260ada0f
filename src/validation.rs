//! Semantic input validation for tool parameters.
//!
//! Type and presence checks happen against the tool definition before a
//! handler runs; these checks cover value ranges and formats.

use crate::types::{Error, Result};

/// Payment modes accepted at checkout.
pub const PAYMENT_MODES: &[&str] = &["upi", "cod"];

/// Validate that a string is not empty.
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate a resource ID that ends up as one URL path segment.
///
/// Blank IDs and the dot segments `.`/`..` would address a different route.
pub fn validate_id(id: &str, field: &str) -> Result<()> {
    validate_non_empty(id, field)?;
    if matches!(id.trim(), "." | "..") {
        return Err(Error::validation(format!("{} is not a valid ID: '{}'", field, id)));
    }
    Ok(())
}

/// Validate a cart quantity is within `1..=max`.
pub fn validate_quantity(quantity: i64, max: u32) -> Result<u32> {
    if quantity < 1 || quantity > i64::from(max) {
        return Err(Error::validation(format!(
            "quantity must be between 1 and {}, got {}",
            max, quantity
        )));
    }
    Ok(quantity as u32)
}

/// Validate a quantity update: `0` (remove) through `max`.
pub fn validate_quantity_update(quantity: i64, max: u32) -> Result<u32> {
    if quantity == 0 {
        return Ok(0);
    }
    validate_quantity(quantity, max)
}

/// Validate a page number or page size.
pub fn validate_positive(n: i64, field: &str) -> Result<u32> {
    if n < 1 || n > i64::from(u32::MAX) {
        return Err(Error::validation(format!("{} must be positive", field)));
    }
    Ok(n as u32)
}

/// Validate a 6-digit postal code not starting with 0.
pub fn validate_pincode(pincode: &str) -> Result<()> {
    let valid = pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0');
    if !valid {
        return Err(Error::validation(format!(
            "pincode must be 6 digits, got '{}'",
            pincode
        )));
    }
    Ok(())
}

/// Validate a 10-digit mobile number starting with 6-9.
pub fn validate_phone(phone: &str) -> Result<()> {
    let valid = phone.len() == 10
        && phone.chars().all(|c| c.is_ascii_digit())
        && matches!(phone.chars().next(), Some('6'..='9'));
    if !valid {
        return Err(Error::validation(format!(
            "phone must be a 10-digit mobile number starting with 6-9, got '{}'",
            phone
        )));
    }
    Ok(())
}

/// Validate a payment mode.
pub fn validate_payment_mode(mode: &str) -> Result<()> {
    if !PAYMENT_MODES.contains(&mode) {
        return Err(Error::validation(format!(
            "payment_mode must be one of: {}, got '{}'",
            PAYMENT_MODES.join(", "),
            mode
        )));
    }
    Ok(())
}

/// Validate a price range where both bounds are non-negative and ordered.
pub fn validate_price_range(min: Option<f64>, max: Option<f64>) -> Result<()> {
    if min.is_some_and(|v| v < 0.0) || max.is_some_and(|v| v < 0.0) {
        return Err(Error::validation("prices cannot be negative"));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(Error::validation(format!(
                "min_price ({}) exceeds max_price ({})",
                min, max
            )));
        }
    }
    Ok(())
}
