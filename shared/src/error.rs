//! Error kinds raised by the planning core
//!
//! All kinds are caller-recoverable: an operation returning one of them has
//! left the record it was applied to untouched.

use thiserror::Error;

use crate::models::PlanStatus;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid quantity for {field}: {reason}")]
    InvalidQuantity { field: String, reason: String },

    #[error("Insufficient stock: {requested} requested, {available} available")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {action} a plan that is {from}")]
    InvalidTransition {
        from: PlanStatus,
        action: &'static str,
    },
}

impl CoreError {
    pub fn invalid_quantity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidQuantity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
