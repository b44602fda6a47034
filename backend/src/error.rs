//! Error handling for the Scallop Planning backend
//!
//! Provides consistent error details in Spanish and English

use serde::Serialize;
use shared::CoreError;
use thiserror::Error;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Domain errors
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    // Record store errors
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

/// Error detail handed to the owning application
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn entity_es(entity: &str) -> &str {
    match entity {
        "InventoryItem" => "el ítem de inventario",
        "HarvestPlan" => "el plan de cosecha",
        "CostCategory" => "la categoría de costo",
        "Assignment" => "la asignación",
        _ => "el registro",
    }
}

fn action_es(action: &str) -> &str {
    match action {
        "execute" => "ejecutar",
        "cancel" => "cancelar",
        _ => "modificar",
    }
}

impl AppError {
    pub fn validation(
        field: impl Into<String>,
        message: impl Into<String>,
        message_es: impl Into<String>,
    ) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }

    pub fn conflict(
        resource: impl Into<String>,
        message: impl Into<String>,
        message_es: impl Into<String>,
    ) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }

    /// Caller-recoverable errors leave every record untouched
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Core(_) | AppError::Validation { .. } | AppError::Conflict { .. }
        )
    }

    /// Bilingual, actionable description of the error
    pub fn detail(&self) -> ErrorDetail {
        let detail = match self {
            AppError::Core(err) => core_detail(err),
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(field.clone()),
            },
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => ErrorDetail {
                code: "CONFLICT".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(resource.clone()),
            },
            AppError::Store(StoreError::NotFound { collection, id }) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("Record {} not found in {}", id, collection),
                message_es: format!("No se encontró el registro {} en {}", id, collection),
                field: None,
            },
            AppError::Store(_) => ErrorDetail {
                code: "STORE_ERROR".to_string(),
                message_en: "The record store could not complete the operation".to_string(),
                message_es: "El almacén de registros no pudo completar la operación".to_string(),
                field: None,
            },
            AppError::Configuration(msg) => ErrorDetail {
                code: "CONFIGURATION_ERROR".to_string(),
                message_en: format!("Configuration error: {}", msg),
                message_es: format!("Error de configuración: {}", msg),
                field: None,
            },
            AppError::Internal(_) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: "An internal error occurred".to_string(),
                message_es: "Ocurrió un error interno".to_string(),
                field: None,
            },
        };

        if self.is_recoverable() {
            tracing::warn!(code = %detail.code, "Rejected: {}", self);
        } else {
            tracing::error!(code = %detail.code, "Error: {:?}", self);
        }

        detail
    }
}

fn core_detail(err: &CoreError) -> ErrorDetail {
    let code = err.code().to_string();
    match err {
        CoreError::InvalidQuantity { field, reason } => ErrorDetail {
            code,
            message_en: format!("Invalid value for {}: {}", field, reason),
            message_es: format!("Valor no válido para {}", field),
            field: Some(field.clone()),
        },
        CoreError::InsufficientStock {
            requested,
            available,
        } => ErrorDetail {
            code,
            message_en: format!(
                "Not enough stock: {} requested, only {} available",
                requested, available
            ),
            message_es: format!(
                "Stock insuficiente: se solicitaron {} y solo hay {} disponibles",
                requested, available
            ),
            field: Some("quantity".to_string()),
        },
        CoreError::NotFound { entity, id } => ErrorDetail {
            code,
            message_en: format!("{} {} not found", entity, id),
            message_es: format!("No se encontró {} {}", entity_es(entity), id),
            field: None,
        },
        CoreError::InvalidTransition { from, action } => ErrorDetail {
            code,
            message_en: format!("Cannot {} a plan that is already {}", action, from),
            message_es: format!(
                "No se puede {} un plan en estado {}",
                action_es(action),
                from
            ),
            field: Some("status".to_string()),
        },
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
