//! Harvest plan lifecycle
//!
//! `planned → completed` on execution, `planned → cancelled` on abandonment.
//! Nothing leaves a terminal status. Every transition validates its whole
//! input before changing the plan.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::allocation::value_of;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{CostLedger, Reconciliation};
use crate::models::{
    CostMap, CreatePlanInput, ExecutionInput, HarvestPlan, InventoryItem, PlanStatus,
};
use crate::survival;
use crate::types::DateRange;
use crate::units::UnitConverter;
use crate::validation::{check, validate_mortality_percent, validate_positive_quantity};

/// Survival metrics of an executed harvest
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HarvestOutcome {
    pub projected_survivors: u64,
    pub actual_quantity: u64,
    /// Actual minus projected survivors
    pub quantity_variance: i64,
    pub quantity_variance_percent: Option<f64>,
    pub realized_mortality: f64,
    /// Realized minus estimated mortality, in percentage points
    pub mortality_deviation: f64,
}

fn append_note(notes: &mut Option<String>, note: Option<String>) {
    let Some(note) = note.filter(|n| !n.trim().is_empty()) else {
        return;
    };
    *notes = Some(match notes.take() {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
        _ => note,
    });
}

impl HarvestPlan {
    /// Create a plan in `planned` status.
    ///
    /// The estimate is normalized to conchitas and every cost line is fixed at
    /// its resolved unit cost.
    pub fn create(
        id: impl Into<String>,
        input: CreatePlanInput,
        converter: &UnitConverter,
        ledger: &CostLedger<'_>,
    ) -> CoreResult<Self> {
        check(
            "estimatedQuantity",
            validate_positive_quantity(input.estimated_quantity),
        )?;
        let estimated_quantity =
            converter.to_conchitas(input.estimated_quantity, input.quantity_unit);
        if estimated_quantity == 0 {
            return Err(CoreError::invalid_quantity(
                "estimatedQuantity",
                "must be at least one conchita",
            ));
        }
        check(
            "estimatedMortality",
            validate_mortality_percent(input.estimated_mortality),
        )?;
        let planned_costs = ledger.resolve_entries(&input.planned_costs)?;

        Ok(Self {
            id: id.into(),
            sector_id: input.sector_id,
            lot_id: input.lot_id,
            planned_date: input.planned_date,
            notes: input.notes,
            size_distribution: input.size_distribution,
            status: PlanStatus::Planned,
            estimated_quantity,
            estimated_mortality: input.estimated_mortality,
            planned_costs,
            actual_date: None,
            actual_quantity: None,
            actual_costs: None,
            inventory_used: Vec::new(),
        })
    }

    fn ensure_planned(&self, action: &'static str) -> CoreResult<()> {
        if self.status != PlanStatus::Planned {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                action,
            });
        }
        Ok(())
    }

    /// Record the actual results and complete the plan.
    ///
    /// An actual quantity of zero is a valid outcome (total loss).
    pub fn execute(
        &mut self,
        input: ExecutionInput,
        today: NaiveDate,
        converter: &UnitConverter,
        ledger: &CostLedger<'_>,
    ) -> CoreResult<()> {
        self.ensure_planned("execute")?;

        if !input.actual_quantity.is_finite() || input.actual_quantity < 0.0 {
            return Err(CoreError::invalid_quantity(
                "actualQuantity",
                "must be a non-negative number",
            ));
        }
        let actual_quantity = converter.to_conchitas(input.actual_quantity, input.quantity_unit);
        let actual_costs = ledger.resolve_entries(&input.actual_costs)?;
        if let Some(usage) = input.inventory_used.iter().find(|u| u.quantity == 0) {
            return Err(CoreError::invalid_quantity(
                format!("inventoryUsed.{}", usage.inventory_item_id),
                "must be greater than zero",
            ));
        }

        self.status = PlanStatus::Completed;
        self.actual_date = Some(input.actual_date.unwrap_or(today));
        self.actual_quantity = Some(actual_quantity);
        self.actual_costs = Some(actual_costs);
        self.inventory_used = input.inventory_used;
        append_note(&mut self.notes, input.notes);
        Ok(())
    }

    /// Abandon a planned harvest
    pub fn cancel(&mut self, reason: Option<String>) -> CoreResult<()> {
        self.ensure_planned("cancel")?;
        self.status = PlanStatus::Cancelled;
        append_note(&mut self.notes, reason);
        Ok(())
    }

    /// Planned vs actual costs; before execution the actual side is empty
    pub fn reconcile(&self, ledger: &CostLedger<'_>) -> CoreResult<Reconciliation> {
        let no_costs = CostMap::new();
        ledger.reconcile(
            &self.planned_costs,
            self.actual_costs.as_ref().unwrap_or(&no_costs),
        )
    }

    /// Survival metrics, once the plan has been executed
    pub fn outcome(&self) -> Option<HarvestOutcome> {
        let actual_quantity = self.actual_quantity?;
        let projected = self.survival_quantity();
        let quantity_variance = i64::try_from(i128::from(actual_quantity) - i128::from(projected))
            .unwrap_or(if actual_quantity > projected { i64::MAX } else { i64::MIN });
        let realized = survival::realized_mortality(self.estimated_quantity, actual_quantity);

        Some(HarvestOutcome {
            projected_survivors: projected,
            actual_quantity,
            quantity_variance,
            quantity_variance_percent: (projected > 0)
                .then(|| quantity_variance as f64 / projected as f64 * 100.0),
            realized_mortality: realized,
            mortality_deviation: realized - self.estimated_mortality,
        })
    }

    /// Inventory used, merged per item
    pub fn consolidated_usage(&self) -> BTreeMap<String, u64> {
        let mut usage = BTreeMap::new();
        for used in &self.inventory_used {
            let total: &mut u64 = usage.entry(used.inventory_item_id.clone()).or_default();
            *total = total.saturating_add(used.quantity);
        }
        usage
    }
}

/// Register an executed plan's inventory usage against the lot it harvested.
///
/// All items are updated or none: consumption is applied to copies and the
/// copies replace the originals only when every item accepted it.
pub fn consume_inventory(
    plan: &HarvestPlan,
    items: &mut BTreeMap<String, InventoryItem>,
) -> CoreResult<()> {
    if plan.status != PlanStatus::Completed {
        return Err(CoreError::InvalidTransition {
            from: plan.status,
            action: "consume inventory for",
        });
    }
    let date = plan.actual_date.unwrap_or(plan.planned_date);

    let mut updated = Vec::new();
    for (item_id, quantity) in plan.consolidated_usage() {
        let mut item = items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("InventoryItem", &item_id))?;
        item.register_consumption(
            plan.lot_id.clone(),
            quantity,
            date,
            Some(format!("Harvest {}", plan.id)),
        )?;
        updated.push((item_id, item));
    }

    items.extend(updated);
    Ok(())
}

/// Value of the inventory used by a plan at the items' unit costs
pub fn materials_cost(plan: &HarvestPlan, items: &BTreeMap<String, InventoryItem>) -> Decimal {
    plan.consolidated_usage()
        .iter()
        .filter_map(|(id, quantity)| {
            items
                .get(id)
                .map(|item| value_of(item.unit_cost, *quantity))
        })
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Planned harvests due within `window_days` of `today`, soonest first
pub fn upcoming<'a>(
    plans: impl IntoIterator<Item = &'a HarvestPlan>,
    today: NaiveDate,
    window_days: u32,
) -> Vec<&'a HarvestPlan> {
    let end = today
        .checked_add_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MAX);
    let window = DateRange::new(today, end);
    let mut due: Vec<&HarvestPlan> = plans
        .into_iter()
        .filter(|p| p.status == PlanStatus::Planned && window.contains(p.planned_date))
        .collect();
    due.sort_by_key(|p| p.planned_date);
    due
}

/// Plans grouped by the `YYYY-MM` month of their planned date
pub fn calendar<'a>(
    plans: impl IntoIterator<Item = &'a HarvestPlan>,
) -> BTreeMap<String, Vec<&'a HarvestPlan>> {
    let mut months: BTreeMap<String, Vec<&HarvestPlan>> = BTreeMap::new();
    for plan in plans {
        months
            .entry(plan.planned_date.format("%Y-%m").to_string())
            .or_default()
            .push(plan);
    }
    for month in months.values_mut() {
        month.sort_by_key(|p| p.planned_date);
    }
    months
}
