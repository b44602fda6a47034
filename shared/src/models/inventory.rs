//! Inventory allocation models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{count, FieldDrift, Loaded, LotId};

/// Allocation status of an inventory item, derived from its breakdown
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    #[default]
    #[serde(alias = "disponible")]
    Available,
    #[serde(alias = "asignado")]
    Assigned,
    #[serde(alias = "mantenimiento")]
    Maintenance,
    Mixed,
}

impl AllocationStatus {
    /// Derive the status from the committed quantities
    pub fn derive(assigned: u64, maintenance: u64) -> Self {
        match (assigned > 0, maintenance > 0) {
            (false, false) => AllocationStatus::Available,
            (true, false) => AllocationStatus::Assigned,
            (false, true) => AllocationStatus::Maintenance,
            (true, true) => AllocationStatus::Mixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Available => "available",
            AllocationStatus::Assigned => "assigned",
            AllocationStatus::Maintenance => "maintenance",
            AllocationStatus::Mixed => "mixed",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split of an item's stock; the three parts always sum to the total
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QuantityBreakdown {
    #[serde(default)]
    pub available: u64,
    #[serde(default)]
    pub assigned: u64,
    #[serde(default)]
    pub maintenance: u64,
}

impl QuantityBreakdown {
    pub fn total(&self) -> u64 {
        self.available + self.assigned + self.maintenance
    }
}

/// A claim on part of an item's stock by a growing lot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub lot_id: LotId,
    #[serde(deserialize_with = "count::deserialize")]
    pub quantity: u64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Stock added by replenishment or an upward count correction
    #[serde(alias = "entrada")]
    In,
    /// Stock removed by a downward count correction
    #[serde(alias = "salida")]
    Out,
    /// Stock drawn by a lot
    #[serde(alias = "outgoing")]
    Consumption,
}

/// One entry of an item's stock history.
///
/// `previous_quantity` and `new_quantity` are the item's available stock
/// around the movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    #[serde(rename = "type")]
    pub kind: MovementKind,
    #[serde(deserialize_with = "count::deserialize")]
    pub quantity: u64,
    #[serde(default, deserialize_with = "count::deserialize")]
    pub previous_quantity: u64,
    #[serde(default, deserialize_with = "count::deserialize")]
    pub new_quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_lot_id: Option<LotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub date: NaiveDate,
}

/// A stocked material (lines, cages, consumables) and its allocation.
///
/// Stock, maintenance and assignments are only changed through the
/// allocation operations; status and breakdown are always derived.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    pub id: String,
    pub category: String,
    pub name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub min_stock: Option<u64>,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub(crate) total_quantity: u64,
    pub(crate) maintenance_quantity: u64,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) movements: Vec<InventoryMovement>,
}

/// Input for stocking a new inventory item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryItem {
    pub category: String,
    pub name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    #[serde(deserialize_with = "count::deserialize")]
    pub quantity: u64,
    #[serde(default)]
    pub min_stock: Option<u64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
}

/// `inventory` collection record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub category: String,
    pub name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    #[serde(deserialize_with = "count::deserialize")]
    pub quantity: u64,
    #[serde(default)]
    pub total_value: Decimal,
    #[serde(default)]
    pub status: AllocationStatus,
    #[serde(default)]
    pub quantity_breakdown: QuantityBreakdown,
    #[serde(default)]
    pub multiple_assignments: Vec<Assignment>,
    #[serde(default, deserialize_with = "count::deserialize_opt")]
    pub min_stock: Option<u64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub movements: Vec<InventoryMovement>,
}

impl InventoryItem {
    /// Stock a new item with its whole quantity available
    pub fn create(id: impl Into<String>, input: NewInventoryItem) -> CoreResult<Self> {
        if input.quantity == 0 {
            return Err(CoreError::invalid_quantity("quantity", "must be greater than zero"));
        }
        if input.unit_cost < Decimal::ZERO {
            return Err(CoreError::invalid_quantity("unitCost", "cannot be negative"));
        }

        Ok(Self {
            id: id.into(),
            category: input.category,
            name: input.name,
            unit: input.unit,
            unit_cost: input.unit_cost,
            min_stock: input.min_stock,
            location: input.location,
            supplier: input.supplier,
            total_quantity: input.quantity,
            maintenance_quantity: 0,
            assignments: Vec::new(),
            movements: Vec::new(),
        })
    }

    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    pub fn maintenance_quantity(&self) -> u64 {
        self.maintenance_quantity
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Stock history, oldest first
    pub fn movements(&self) -> &[InventoryMovement] {
        &self.movements
    }

    /// Rebuild an item from its record, recomputing every derived field.
    ///
    /// Duplicate assignments for one lot are merged. Derived values that
    /// disagree with the recomputation are reported as drift.
    pub fn from_record(record: InventoryRecord) -> CoreResult<Loaded<Self>> {
        let mut assignments: Vec<Assignment> = Vec::with_capacity(record.multiple_assignments.len());
        let mut drift = Vec::new();

        for assignment in record.multiple_assignments {
            if assignment.quantity == 0 {
                drift.push(FieldDrift::new(
                    format!("multipleAssignments.{}", assignment.lot_id),
                    0,
                    "dropped",
                ));
                continue;
            }
            match assignments.iter_mut().find(|a| a.lot_id == assignment.lot_id) {
                Some(existing) => {
                    drift.push(FieldDrift::new(
                        format!("multipleAssignments.{}", assignment.lot_id),
                        "duplicate",
                        "merged",
                    ));
                    existing.quantity = existing.quantity.saturating_add(assignment.quantity);
                }
                None => assignments.push(assignment),
            }
        }

        let item = Self {
            id: record.id,
            category: record.category,
            name: record.name,
            unit: record.unit,
            unit_cost: record.unit_cost,
            min_stock: record.min_stock,
            location: record.location,
            supplier: record.supplier,
            total_quantity: record.quantity,
            maintenance_quantity: record.quantity_breakdown.maintenance,
            assignments,
            movements: record.movements,
        };

        let committed = item
            .assignments
            .iter()
            .try_fold(item.maintenance_quantity, |sum, a| sum.checked_add(a.quantity));
        match committed {
            Some(committed) if committed <= item.total_quantity => {}
            committed => {
                return Err(CoreError::InsufficientStock {
                    requested: committed.unwrap_or(u64::MAX),
                    available: item.total_quantity,
                })
            }
        }

        let breakdown = item.breakdown();
        let status = item.status();
        if record.status != status {
            drift.push(FieldDrift::new("status", record.status, status));
        }
        if record.quantity_breakdown.available != breakdown.available {
            drift.push(FieldDrift::new(
                "quantityBreakdown.available",
                record.quantity_breakdown.available,
                breakdown.available,
            ));
        }
        if record.quantity_breakdown.assigned != breakdown.assigned {
            drift.push(FieldDrift::new(
                "quantityBreakdown.assigned",
                record.quantity_breakdown.assigned,
                breakdown.assigned,
            ));
        }
        if record.total_value != item.total_value() {
            drift.push(FieldDrift::new("totalValue", record.total_value, item.total_value()));
        }

        Ok(Loaded { value: item, drift })
    }

    /// Record with every derived field freshly computed
    pub fn to_record(&self) -> InventoryRecord {
        InventoryRecord {
            id: self.id.clone(),
            category: self.category.clone(),
            name: self.name.clone(),
            unit: self.unit.clone(),
            unit_cost: self.unit_cost,
            quantity: self.total_quantity,
            total_value: self.total_value(),
            status: self.status(),
            quantity_breakdown: self.breakdown(),
            multiple_assignments: self.assignments.clone(),
            min_stock: self.min_stock,
            location: self.location.clone(),
            supplier: self.supplier.clone(),
            movements: self.movements.clone(),
        }
    }
}
