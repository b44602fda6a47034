//! Shared planning core for the Scallop Planning Platform
//!
//! This crate holds the pure domain logic shared between the backend service
//! layer and the browser front end (via WASM): quantity unit conversion,
//! survival projection, inventory allocation, cost reconciliation and the
//! harvest plan state machine. Nothing here performs I/O.

pub mod allocation;
pub mod error;
pub mod ledger;
pub mod models;
pub mod planning;
pub mod survival;
pub mod types;
pub mod units;
pub mod validation;

pub use allocation::*;
pub use error::*;
pub use ledger::*;
pub use models::*;
pub use planning::*;
pub use types::*;
pub use units::*;
pub use validation::*;
