//! Scallop Planning Platform - Backend services
//!
//! Async service layer over the shared planning core: record store access,
//! per-record write serialization, harvest plan orchestration, inventory
//! allocation and cost category management. HTTP routing and persistence
//! engines belong to the owning application.

pub mod config;
pub mod error;
pub mod locks;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorDetail};
pub use services::PlanningServices;
