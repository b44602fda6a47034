//! Cost ledger: planned vs actual cost reconciliation
//!
//! Category metadata is looked up in a catalog of every category ever known,
//! so plans keep resolving categories that were later deactivated.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::models::{CostCategory, CostEntry, CostMap};
use crate::types::CostCategoryId;
use crate::validation;

/// Read-through lookup over all known cost categories, active or not
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    categories: BTreeMap<CostCategoryId, CostCategory>,
}

impl CategoryCatalog {
    pub fn new(categories: impl IntoIterator<Item = CostCategory>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|category| (category.id.clone(), category))
                .collect(),
        }
    }

    pub fn get(&self, id: &CostCategoryId) -> Option<&CostCategory> {
        self.categories.get(id)
    }

    pub fn resolve(&self, id: &CostCategoryId) -> CoreResult<&CostCategory> {
        self.get(id)
            .ok_or_else(|| CoreError::not_found("CostCategory", id))
    }

    /// Currently active categories
    pub fn active(&self) -> impl Iterator<Item = &CostCategory> {
        self.categories.values().filter(|c| c.is_active)
    }

    /// Categories to show for a plan: active ones plus any it references
    pub fn for_plan<'a>(
        &'a self,
        referenced: impl IntoIterator<Item = &'a CostCategoryId>,
    ) -> Vec<&'a CostCategory> {
        let referenced: BTreeSet<&CostCategoryId> = referenced.into_iter().collect();
        self.categories
            .values()
            .filter(|c| c.is_active || referenced.contains(&c.id))
            .collect()
    }

    /// Insert or replace a category
    pub fn upsert(&mut self, category: CostCategory) {
        self.categories.insert(category.id.clone(), category);
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Per-category line of a reconciliation
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VarianceLine {
    pub category_id: CostCategoryId,
    pub name: String,
    pub unit: String,
    pub planned_subtotal: Decimal,
    pub actual_subtotal: Decimal,
    pub variance: Decimal,
    /// Variance relative to the planned subtotal; none when nothing was planned
    pub variance_percent: Option<Decimal>,
}

/// Planned vs actual comparison over a category set
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub lines: Vec<VarianceLine>,
    pub total_planned: Decimal,
    pub total_actual: Decimal,
    pub total_variance: Decimal,
    pub variance_percent: Option<Decimal>,
    /// Informational only; execution is never blocked by an overrun
    pub within_budget: bool,
}

impl Reconciliation {
    pub fn line(&self, category_id: &CostCategoryId) -> Option<&VarianceLine> {
        self.lines.iter().find(|l| &l.category_id == category_id)
    }
}

fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        return None;
    }
    part.checked_div(whole)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|percent| percent.round_dp(2))
}

fn out_of_range(field: impl Into<String>) -> CoreError {
    CoreError::invalid_quantity(field, "cost exceeds the representable range")
}

fn checked_sum(field: &str, values: impl IntoIterator<Item = Decimal>) -> CoreResult<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
        .ok_or_else(|| out_of_range(field))
}

/// Cost computations against a category catalog
#[derive(Debug, Clone, Copy)]
pub struct CostLedger<'a> {
    catalog: &'a CategoryCatalog,
}

impl<'a> CostLedger<'a> {
    pub fn new(catalog: &'a CategoryCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a CategoryCatalog {
        self.catalog
    }

    /// Unit cost of an entry, falling back to the category default
    pub fn unit_cost(&self, category_id: &CostCategoryId, entry: &CostEntry) -> CoreResult<Decimal> {
        match entry.unit_cost {
            Some(cost) => Ok(cost),
            None => Ok(self.catalog.resolve(category_id)?.estimated_cost),
        }
    }

    /// `quantity × (unitCost ?? category.estimatedCost)`
    pub fn subtotal(&self, category_id: &CostCategoryId, entry: &CostEntry) -> CoreResult<Decimal> {
        entry
            .quantity
            .checked_mul(self.unit_cost(category_id, entry)?)
            .ok_or_else(|| out_of_range(format!("costs.{}", category_id)))
    }

    fn subtotal_in(&self, costs: &CostMap, category_id: &CostCategoryId) -> CoreResult<Decimal> {
        match costs.get(category_id) {
            Some(entry) => self.subtotal(category_id, entry),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Sum of all subtotals of a cost map
    pub fn total(&self, costs: &CostMap) -> CoreResult<Decimal> {
        let subtotals = costs
            .iter()
            .map(|(id, entry)| self.subtotal(id, entry))
            .collect::<CoreResult<Vec<_>>>()?;
        checked_sum("costs", subtotals)
    }

    /// Actual minus planned subtotal; a category missing from one side counts as zero there
    pub fn variance(
        &self,
        category_id: &CostCategoryId,
        planned: &CostMap,
        actual: &CostMap,
    ) -> CoreResult<Decimal> {
        self.subtotal_in(actual, category_id)?
            .checked_sub(self.subtotal_in(planned, category_id)?)
            .ok_or_else(|| out_of_range(format!("costs.{}", category_id)))
    }

    pub fn within_budget(&self, planned: &CostMap, actual: &CostMap) -> CoreResult<bool> {
        Ok(self.total(actual)? <= self.total(planned)?)
    }

    /// Validate a cost map and fix each entry's unit cost at its current value.
    ///
    /// Fails when a subtotal or the total does not fit in a `Decimal`.
    pub fn resolve_entries(&self, costs: &CostMap) -> CoreResult<CostMap> {
        let resolved = costs
            .iter()
            .map(|(id, entry)| {
                validation::check(
                    &format!("costs.{}", id),
                    validation::validate_cost_entry(entry),
                )?;
                let unit_cost = self.unit_cost(id, entry)?;
                Ok((id.clone(), CostEntry::new(entry.quantity, Some(unit_cost))))
            })
            .collect::<CoreResult<CostMap>>()?;
        self.total(&resolved)?;
        Ok(resolved)
    }

    /// Planned keys, actual keys and the active categories
    pub fn category_set(&self, planned: &CostMap, actual: &CostMap) -> BTreeSet<CostCategoryId> {
        planned
            .keys()
            .chain(actual.keys())
            .cloned()
            .chain(self.catalog.active().map(|c| c.id.clone()))
            .collect()
    }

    /// Compare planned and actual costs category by category
    pub fn reconcile(&self, planned: &CostMap, actual: &CostMap) -> CoreResult<Reconciliation> {
        let mut lines = Vec::new();
        for category_id in self.category_set(planned, actual) {
            let planned_subtotal = self.subtotal_in(planned, &category_id)?;
            let actual_subtotal = self.subtotal_in(actual, &category_id)?;
            let variance = actual_subtotal
                .checked_sub(planned_subtotal)
                .ok_or_else(|| out_of_range(format!("costs.{}", category_id)))?;
            let (name, unit) = match self.catalog.get(&category_id) {
                Some(category) => (category.name.clone(), category.unit.clone()),
                None => (category_id.to_string(), String::new()),
            };
            lines.push(VarianceLine {
                category_id,
                name,
                unit,
                planned_subtotal,
                actual_subtotal,
                variance,
                variance_percent: percent_of(variance, planned_subtotal),
            });
        }

        let total_planned = checked_sum("plannedCosts", lines.iter().map(|l| l.planned_subtotal))?;
        let total_actual = checked_sum("actualCosts", lines.iter().map(|l| l.actual_subtotal))?;
        let total_variance = total_actual
            .checked_sub(total_planned)
            .ok_or_else(|| out_of_range("costs"))?;

        Ok(Reconciliation {
            lines,
            total_planned,
            total_actual,
            total_variance,
            variance_percent: percent_of(total_variance, total_planned),
            within_budget: total_actual <= total_planned,
        })
    }
}
