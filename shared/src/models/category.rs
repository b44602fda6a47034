//! Harvest cost category models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::CostCategoryId;

/// Record `type` of harvest cost categories in the `categories` collection
pub const HARVEST_COST_TYPE: &str = "harvest_cost";

fn harvest_cost_type() -> String {
    HARVEST_COST_TYPE.to_string()
}

fn active_by_default() -> bool {
    true
}

/// A named classification of harvest expense with a default unit cost.
///
/// Categories are never hard-deleted; a deactivated category still resolves
/// for the plans that referenced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostCategory {
    pub id: CostCategoryId,
    pub name: String,
    /// Unit label, e.g. "jornal" or "viaje"
    pub unit: String,
    /// Default unit cost used when a plan entry does not override it
    pub estimated_cost: Decimal,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(rename = "type", default = "harvest_cost_type")]
    pub kind: String,
}

impl CostCategory {
    pub fn new(
        id: CostCategoryId,
        name: impl Into<String>,
        unit: impl Into<String>,
        estimated_cost: Decimal,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            unit: unit.into(),
            estimated_cost,
            is_active: true,
            kind: harvest_cost_type(),
        }
    }
}
