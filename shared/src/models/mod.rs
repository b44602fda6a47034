//! Domain models for the Scallop Planning Platform

mod category;
mod harvest;
mod inventory;
mod pricing;

pub use category::*;
pub use harvest::*;
pub use inventory::*;
pub use pricing::*;
