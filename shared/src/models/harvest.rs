//! Harvest plan models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreResult;
use crate::ledger::CostLedger;
use crate::survival;
use crate::types::{count, CostCategoryId, FieldDrift, Loaded, LotId, QuantityUnit};

/// Lifecycle of a harvest plan; `completed` and `cancelled` are terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    #[serde(alias = "planificado")]
    Planned,
    #[serde(alias = "completado")]
    Completed,
    #[serde(alias = "cancelado")]
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planned => "planned",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlanStatus::Planned)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cost line: a quantity of a category at a unit cost.
///
/// A missing unit cost falls back to the category's estimated cost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
}

impl CostEntry {
    pub fn new(quantity: Decimal, unit_cost: Option<Decimal>) -> Self {
        Self {
            quantity,
            unit_cost,
        }
    }

    /// `quantity × unitCost`, if the unit cost is known.
    ///
    /// Saturates at `Decimal::MAX`; entries accepted through the ledger always fit.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_cost.map(|cost| self.quantity.saturating_mul(cost))
    }
}

/// Cost lines keyed by category
pub type CostMap = BTreeMap<CostCategoryId, CostEntry>;

/// Sum of the resolved subtotals of a cost map; unresolved lines count as zero
pub fn snapshot_total(costs: &CostMap) -> Decimal {
    costs
        .values()
        .filter_map(CostEntry::subtotal)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Inventory consumed by a harvest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUsage {
    #[serde(alias = "id")]
    pub inventory_item_id: String,
    #[serde(deserialize_with = "count::deserialize")]
    pub quantity: u64,
}

/// A harvest plan.
///
/// Quantities are conchitas. Status, costs and execution results change only
/// through the lifecycle operations; survival and totals are always derived.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestPlan {
    pub id: String,
    pub sector_id: String,
    pub lot_id: LotId,
    pub planned_date: NaiveDate,
    pub notes: Option<String>,
    /// Expected harvest split by size category, in conchitas
    pub size_distribution: BTreeMap<String, u64>,
    pub(crate) status: PlanStatus,
    pub(crate) estimated_quantity: u64,
    pub(crate) estimated_mortality: f64,
    pub(crate) planned_costs: CostMap,
    pub(crate) actual_date: Option<NaiveDate>,
    pub(crate) actual_quantity: Option<u64>,
    pub(crate) actual_costs: Option<CostMap>,
    pub(crate) inventory_used: Vec<InventoryUsage>,
}

impl HarvestPlan {
    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn estimated_quantity(&self) -> u64 {
        self.estimated_quantity
    }

    pub fn estimated_mortality(&self) -> f64 {
        self.estimated_mortality
    }

    /// Projected survivors of the estimated quantity
    pub fn survival_quantity(&self) -> u64 {
        survival::project(self.estimated_quantity as f64, self.estimated_mortality)
    }

    pub fn planned_costs(&self) -> &CostMap {
        &self.planned_costs
    }

    pub fn actual_date(&self) -> Option<NaiveDate> {
        self.actual_date
    }

    pub fn actual_quantity(&self) -> Option<u64> {
        self.actual_quantity
    }

    pub fn actual_costs(&self) -> Option<&CostMap> {
        self.actual_costs.as_ref()
    }

    pub fn inventory_used(&self) -> &[InventoryUsage] {
        &self.inventory_used
    }

    pub fn total_planned_cost(&self) -> Decimal {
        snapshot_total(&self.planned_costs)
    }

    /// Total of the actual costs, once executed
    pub fn total_actual_cost(&self) -> Option<Decimal> {
        self.actual_costs.as_ref().map(snapshot_total)
    }

    /// Categories referenced by this plan's cost lines
    pub fn referenced_categories(&self) -> impl Iterator<Item = &CostCategoryId> {
        self.planned_costs
            .keys()
            .chain(self.actual_costs.iter().flat_map(|costs| costs.keys()))
    }
}

/// Input for creating a plan; the estimate may be given in any unit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanInput {
    pub sector_id: String,
    pub lot_id: LotId,
    pub planned_date: NaiveDate,
    pub estimated_quantity: f64,
    #[serde(default)]
    pub quantity_unit: QuantityUnit,
    #[serde(default)]
    pub estimated_mortality: f64,
    #[serde(default)]
    pub planned_costs: CostMap,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub size_distribution: BTreeMap<String, u64>,
}

/// Actual field results of a harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInput {
    pub actual_quantity: f64,
    #[serde(default)]
    pub quantity_unit: QuantityUnit,
    /// Defaults to the execution day
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
    #[serde(default)]
    pub actual_costs: CostMap,
    #[serde(default)]
    pub inventory_used: Vec<InventoryUsage>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `harvestPlans` collection record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HarvestPlanRecord {
    pub id: String,
    pub sector_id: String,
    pub lot_id: LotId,
    #[serde(default)]
    pub status: PlanStatus,
    pub planned_date: NaiveDate,
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
    #[serde(deserialize_with = "count::deserialize")]
    pub estimated_quantity: u64,
    #[serde(default)]
    pub estimated_mortality: f64,
    #[serde(default, deserialize_with = "count::deserialize_opt")]
    pub survival_quantity: Option<u64>,
    #[serde(default)]
    pub planned_costs: CostMap,
    #[serde(default)]
    pub total_planned_cost: Option<Decimal>,
    #[serde(default)]
    pub actual_costs: Option<CostMap>,
    #[serde(default)]
    pub total_actual_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "count::deserialize_opt")]
    pub actual_quantity: Option<u64>,
    #[serde(default)]
    pub inventory_used: Vec<InventoryUsage>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub size_distribution: BTreeMap<String, u64>,
}

/// Fill unit costs missing from a stored cost map, reporting each line touched
fn resolve_stored_costs(
    prefix: &str,
    costs: &mut CostMap,
    ledger: &CostLedger<'_>,
    drift: &mut Vec<FieldDrift>,
) {
    for (category_id, entry) in costs.iter_mut() {
        if entry.unit_cost.is_some() {
            continue;
        }
        let field = format!("{}.{}.unitCost", prefix, category_id);
        match ledger.unit_cost(category_id, entry) {
            Ok(cost) => {
                drift.push(FieldDrift::new(field, "missing", cost));
                entry.unit_cost = Some(cost);
            }
            Err(_) => drift.push(FieldDrift::new(field, "missing", "unknown category")),
        }
    }
}

impl HarvestPlanRecord {
    /// Rebuild the plan, recomputing survival and totals.
    ///
    /// Cost lines stored without a unit cost are resolved through the ledger.
    /// Lines of unknown categories stay unresolved and count as zero.
    pub fn into_plan(self, ledger: &CostLedger<'_>) -> CoreResult<Loaded<HarvestPlan>> {
        let mut drift = Vec::new();
        let mut planned_costs = self.planned_costs;
        let mut actual_costs = self.actual_costs;

        resolve_stored_costs("plannedCosts", &mut planned_costs, ledger, &mut drift);
        if let Some(costs) = actual_costs.as_mut() {
            resolve_stored_costs("actualCosts", costs, ledger, &mut drift);
        }

        let plan = HarvestPlan {
            id: self.id,
            sector_id: self.sector_id,
            lot_id: self.lot_id,
            planned_date: self.planned_date,
            notes: self.notes,
            size_distribution: self.size_distribution,
            status: self.status,
            estimated_quantity: self.estimated_quantity,
            estimated_mortality: self.estimated_mortality,
            planned_costs,
            actual_date: self.actual_date,
            actual_quantity: self.actual_quantity,
            actual_costs,
            inventory_used: self.inventory_used,
        };

        let survival = plan.survival_quantity();
        if self.survival_quantity != Some(survival) {
            drift.push(FieldDrift::new(
                "survivalQuantity",
                display_opt(self.survival_quantity),
                survival,
            ));
        }
        let planned_total = plan.total_planned_cost();
        if self.total_planned_cost != Some(planned_total) {
            drift.push(FieldDrift::new(
                "totalPlannedCost",
                display_opt(self.total_planned_cost),
                planned_total,
            ));
        }
        let actual_total = plan.total_actual_cost();
        if self.total_actual_cost != actual_total {
            drift.push(FieldDrift::new(
                "totalActualCost",
                display_opt(self.total_actual_cost),
                display_opt(actual_total),
            ));
        }

        Ok(Loaded { value: plan, drift })
    }
}

fn display_opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

impl From<&HarvestPlan> for HarvestPlanRecord {
    fn from(plan: &HarvestPlan) -> Self {
        Self {
            id: plan.id.clone(),
            sector_id: plan.sector_id.clone(),
            lot_id: plan.lot_id.clone(),
            status: plan.status,
            planned_date: plan.planned_date,
            actual_date: plan.actual_date,
            estimated_quantity: plan.estimated_quantity,
            estimated_mortality: plan.estimated_mortality,
            survival_quantity: Some(plan.survival_quantity()),
            planned_costs: plan.planned_costs.clone(),
            total_planned_cost: Some(plan.total_planned_cost()),
            actual_costs: plan.actual_costs.clone(),
            total_actual_cost: plan.total_actual_cost(),
            actual_quantity: plan.actual_quantity,
            inventory_used: plan.inventory_used.clone(),
            notes: plan.notes.clone(),
            size_distribution: plan.size_distribution.clone(),
        }
    }
}
