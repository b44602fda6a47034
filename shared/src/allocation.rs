//! Inventory allocation state machine
//!
//! An item's stock is split into available, assigned (possibly across many
//! lots) and maintenance portions. Every operation validates against the
//! current state before touching it, so a rejected operation leaves the item
//! exactly as it was. Callers are responsible for serializing operations on
//! the same item.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::{
    AllocationStatus, Assignment, InventoryItem, InventoryMovement, MovementKind, QuantityBreakdown,
};
use crate::types::LotId;

/// Value of an item split along its breakdown
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownValue {
    pub available: Decimal,
    pub assigned: Decimal,
    pub maintenance: Decimal,
}

/// Number of items in each allocation status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub available: usize,
    pub assigned: usize,
    pub maintenance: usize,
    pub mixed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: AllocationStatus) {
        match status {
            AllocationStatus::Available => self.available += 1,
            AllocationStatus::Assigned => self.assigned += 1,
            AllocationStatus::Maintenance => self.maintenance += 1,
            AllocationStatus::Mixed => self.mixed += 1,
        }
    }
}

/// Stock valuation across a set of items
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSummary {
    pub total_value: Decimal,
    pub by_portion: BreakdownValue,
    pub items_by_status: StatusCounts,
    pub low_stock_items: usize,
}

/// Summarize the value of `items`, splitting each over its breakdown
pub fn summarize_valuation<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> ValuationSummary {
    items
        .into_iter()
        .fold(ValuationSummary::default(), |mut summary, item| {
            let value = item.breakdown_value();
            summary.total_value = summary.total_value.saturating_add(item.total_value());
            let portion = &mut summary.by_portion;
            portion.available = portion.available.saturating_add(value.available);
            portion.assigned = portion.assigned.saturating_add(value.assigned);
            portion.maintenance = portion.maintenance.saturating_add(value.maintenance);
            summary.items_by_status.record(item.status());
            if item.is_low_stock() {
                summary.low_stock_items += 1;
            }
            summary
        })
}

fn require_positive(field: &str, quantity: u64) -> CoreResult<()> {
    if quantity == 0 {
        return Err(CoreError::invalid_quantity(field, "must be greater than zero"));
    }
    Ok(())
}

fn ensure_fits(requested: u64, available: u64) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            requested,
            available,
        });
    }
    Ok(())
}

fn append_note(existing: &mut Option<String>, note: Option<String>) {
    let Some(note) = note.filter(|n| !n.trim().is_empty()) else {
        return;
    };
    *existing = Some(match existing.take() {
        Some(prev) if !prev.is_empty() => format!("{}; {}", prev, note),
        _ => note,
    });
}

/// `unitCost × quantity`, saturating at `Decimal::MAX`
pub(crate) fn value_of(unit_cost: Decimal, quantity: u64) -> Decimal {
    unit_cost.saturating_mul(Decimal::from(quantity))
}

impl InventoryItem {
    /// Sum of all assignment quantities
    pub fn assigned_quantity(&self) -> u64 {
        self.assignments
            .iter()
            .fold(0u64, |sum, a| sum.saturating_add(a.quantity))
    }

    /// Quantity held by assignments and maintenance
    pub fn committed_quantity(&self) -> u64 {
        self.assigned_quantity().saturating_add(self.maintenance_quantity)
    }

    pub fn available_quantity(&self) -> u64 {
        self.total_quantity.saturating_sub(self.committed_quantity())
    }

    pub fn breakdown(&self) -> QuantityBreakdown {
        QuantityBreakdown {
            available: self.available_quantity(),
            assigned: self.assigned_quantity(),
            maintenance: self.maintenance_quantity,
        }
    }

    pub fn status(&self) -> AllocationStatus {
        AllocationStatus::derive(self.assigned_quantity(), self.maintenance_quantity)
    }

    pub fn assignment(&self, lot_id: &LotId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| &a.lot_id == lot_id)
    }

    fn assignment_index(&self, lot_id: &LotId) -> CoreResult<usize> {
        self.assignments
            .iter()
            .position(|a| &a.lot_id == lot_id)
            .ok_or_else(|| CoreError::not_found("Assignment", lot_id))
    }

    /// Assign `quantity` units to a lot.
    ///
    /// A lot holds at most one assignment per item: assigning again to the
    /// same lot grows its existing assignment.
    pub fn add_assignment(
        &mut self,
        lot_id: LotId,
        quantity: u64,
        date: NaiveDate,
        notes: Option<String>,
    ) -> CoreResult<()> {
        require_positive("quantity", quantity)?;
        ensure_fits(quantity, self.available_quantity())?;

        match self.assignments.iter_mut().find(|a| a.lot_id == lot_id) {
            Some(existing) => {
                existing.quantity += quantity;
                append_note(&mut existing.notes, notes);
            }
            None => self.assignments.push(Assignment {
                lot_id,
                quantity,
                date,
                notes,
            }),
        }
        Ok(())
    }

    /// Remove a lot's assignment, returning it
    pub fn remove_assignment(&mut self, lot_id: &LotId) -> CoreResult<Assignment> {
        let index = self.assignment_index(lot_id)?;
        Ok(self.assignments.remove(index))
    }

    /// Change the quantity of a lot's existing assignment
    pub fn update_assignment_quantity(&mut self, lot_id: &LotId, quantity: u64) -> CoreResult<()> {
        require_positive("quantity", quantity)?;
        let index = self.assignment_index(lot_id)?;
        let current = self.assignments[index].quantity;
        ensure_fits(quantity, self.available_quantity() + current)?;

        self.assignments[index].quantity = quantity;
        Ok(())
    }

    /// Set the quantity held for maintenance; zero clears it
    pub fn set_maintenance_quantity(&mut self, quantity: u64) -> CoreResult<()> {
        let free = self.total_quantity.saturating_sub(self.assigned_quantity());
        ensure_fits(quantity, free)?;

        self.maintenance_quantity = quantity;
        Ok(())
    }

    /// Clear all assignments and maintenance, returning the released assignments
    pub fn release(&mut self) -> Vec<Assignment> {
        self.maintenance_quantity = 0;
        std::mem::take(&mut self.assignments)
    }

    /// Replace the stocked total (replenishment or count correction).
    ///
    /// Stock cannot shrink below what is already committed. A change is
    /// logged as an `in` or `out` movement; an unchanged total logs nothing.
    pub fn resize(
        &mut self,
        new_total_quantity: u64,
        date: NaiveDate,
        reason: Option<String>,
    ) -> CoreResult<()> {
        let committed = self.committed_quantity();
        if new_total_quantity < committed {
            return Err(CoreError::InsufficientStock {
                requested: committed,
                available: new_total_quantity,
            });
        }

        let previous_total = self.total_quantity;
        let (kind, quantity) = match new_total_quantity.cmp(&previous_total) {
            std::cmp::Ordering::Equal => return Ok(()),
            std::cmp::Ordering::Greater => (MovementKind::In, new_total_quantity - previous_total),
            std::cmp::Ordering::Less => (MovementKind::Out, previous_total - new_total_quantity),
        };
        let previous_quantity = self.available_quantity();
        self.total_quantity = new_total_quantity;
        self.log_movement(kind, quantity, previous_quantity, None, reason, date);
        Ok(())
    }

    fn log_movement(
        &mut self,
        kind: MovementKind,
        quantity: u64,
        previous_quantity: u64,
        related_lot_id: Option<LotId>,
        reason: Option<String>,
        date: NaiveDate,
    ) {
        let new_quantity = self.available_quantity();
        self.movements.push(InventoryMovement {
            kind,
            quantity,
            previous_quantity,
            new_quantity,
            related_lot_id,
            reason: reason.filter(|r| !r.trim().is_empty()),
            date,
        });
    }

    /// Register `quantity` units consumed by a lot.
    ///
    /// An existing assignment of the lot is consumed first: its quantity
    /// becomes the larger of what was reserved and what was consumed, any
    /// excess drawing on available stock. Without one, a new assignment is
    /// created. Every consumption is logged as a movement for the lot.
    pub fn register_consumption(
        &mut self,
        lot_id: LotId,
        quantity: u64,
        date: NaiveDate,
        notes: Option<String>,
    ) -> CoreResult<()> {
        require_positive("quantity", quantity)?;
        let previous_quantity = self.available_quantity();

        match self.assignment_index(&lot_id) {
            Ok(index) => {
                let reserved = self.assignments[index].quantity;
                let extra = quantity.saturating_sub(reserved);
                ensure_fits(extra, previous_quantity)?;

                let assignment = &mut self.assignments[index];
                assignment.quantity = reserved.max(quantity);
                append_note(&mut assignment.notes, notes.clone());
            }
            Err(_) => self.add_assignment(lot_id.clone(), quantity, date, notes.clone())?,
        }

        self.log_movement(
            MovementKind::Consumption,
            quantity,
            previous_quantity,
            Some(lot_id),
            notes,
            date,
        );
        Ok(())
    }

    /// `totalQuantity × unitCost`
    pub fn total_value(&self) -> Decimal {
        value_of(self.unit_cost, self.total_quantity)
    }

    pub fn breakdown_value(&self) -> BreakdownValue {
        let breakdown = self.breakdown();
        BreakdownValue {
            available: value_of(self.unit_cost, breakdown.available),
            assigned: value_of(self.unit_cost, breakdown.assigned),
            maintenance: value_of(self.unit_cost, breakdown.maintenance),
        }
    }

    /// Available stock at or below the configured minimum
    pub fn is_low_stock(&self) -> bool {
        self.min_stock
            .is_some_and(|min| self.available_quantity() <= min)
    }
}
