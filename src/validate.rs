//! # Input Validation Module
//!
//! Validation for user-entered values before they touch session state or the
//! store. Rejection returns an error and leaves state untouched; the caller
//! keeps its "Add" affordance disabled until the input is corrected.

use crate::config::{MAX_MANUAL_KCAL, MAX_QUANTITY};
use crate::errors::ValidationError;

/// Parse and validate a quantity multiplier typed by the user.
///
/// Accepts values in `(0, 10_000]`. Anything non-numeric (including the
/// empty string) is rejected rather than treated as zero.
pub fn parse_quantity(input: &str) -> Result<f32, ValidationError> {
    let value: f32 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber)?;
    validate_quantity(value)?;
    Ok(value)
}

/// Validate an already-numeric quantity multiplier.
pub fn validate_quantity(value: f32) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive);
    }
    if value > MAX_QUANTITY {
        return Err(ValidationError::TooLarge(MAX_QUANTITY));
    }
    Ok(())
}

/// Parse and validate a manual kcal figure for an ad-hoc diary entry.
///
/// Accepts values in `(0, 100_000]`.
pub fn parse_manual_kcal(input: &str) -> Result<f32, ValidationError> {
    let value: f32 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber)?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive);
    }
    if value > MAX_MANUAL_KCAL {
        return Err(ValidationError::TooLarge(MAX_MANUAL_KCAL));
    }
    Ok(value)
}

/// Validate the title of an ad-hoc diary entry.
pub fn validate_entry_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}
