//! Validation utilities for the Scallop Planning Platform
//!
//! Plain checks returning a static message. The planning engine maps them to
//! `CoreError::InvalidQuantity` with the offending field name.

use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::models::CostEntry;

// ============================================================================
// Planning Validations
// ============================================================================

/// Validate a mortality percentage (0-100)
pub fn validate_mortality_percent(mortality: f64) -> Result<(), &'static str> {
    if !mortality.is_finite() {
        return Err("Mortality must be a finite number");
    }
    if !(0.0..=100.0).contains(&mortality) {
        return Err("Mortality must be between 0 and 100%");
    }
    Ok(())
}

/// Validate a quantity entered in any unit before conversion
pub fn validate_positive_quantity(quantity: f64) -> Result<(), &'static str> {
    if !quantity.is_finite() {
        return Err("Quantity must be a finite number");
    }
    if quantity <= 0.0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a cost line: quantity and unit cost cannot be negative
pub fn validate_cost_entry(entry: &CostEntry) -> Result<(), &'static str> {
    if entry.quantity < Decimal::ZERO {
        return Err("Cost quantity cannot be negative");
    }
    if entry.unit_cost.is_some_and(|cost| cost < Decimal::ZERO) {
        return Err("Unit cost cannot be negative");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a record identifier supplied by a caller
pub fn validate_record_id(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("Identifier cannot be empty");
    }
    if id.len() > 128 {
        return Err("Identifier is too long");
    }
    Ok(())
}

/// Attach a field name to a failed check
pub(crate) fn check(field: &str, result: Result<(), &'static str>) -> Result<(), CoreError> {
    result.map_err(|reason| CoreError::invalid_quantity(field, reason))
}
