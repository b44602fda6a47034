//! Cost category management
//!
//! Categories are never hard-deleted: deleting deactivates, so plans that
//! referenced a category keep resolving it.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    new_record_id, validate_record_id, CategoryCatalog, CostCategory, CostCategoryId, CoreError,
    HarvestPlan, HARVEST_COST_TYPE,
};
use std::sync::Arc;

use super::not_found_as;
use crate::error::{AppError, AppResult};
use crate::locks::RecordLocks;
use crate::store::{self, Collection, RecordFilter, RecordStore};

/// Input for creating a cost category
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCostCategory {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub unit: String,
    pub estimated_cost: Decimal,
}

/// Input for updating a cost category
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCategoryUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub estimated_cost: Option<Decimal>,
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation(
            "name",
            "Category name cannot be empty",
            "El nombre de la categoría no puede estar vacío",
        ));
    }
    Ok(())
}

fn validate_id(id: &str) -> AppResult<()> {
    validate_record_id(id).map_err(|reason| {
        AppError::validation("id", reason, "El identificador de la categoría no es válido")
    })
}

fn validate_estimated_cost(cost: Decimal) -> AppResult<()> {
    if cost < Decimal::ZERO {
        return Err(CoreError::invalid_quantity("estimatedCost", "cannot be negative").into());
    }
    Ok(())
}

/// Cost category service
#[derive(Clone)]
pub struct CostCategoryService {
    store: Arc<dyn RecordStore>,
    locks: RecordLocks,
}

impl CostCategoryService {
    pub fn new(store: Arc<dyn RecordStore>, locks: RecordLocks) -> Self {
        Self { store, locks }
    }

    /// Every harvest cost category ever stored, active or not
    pub async fn catalog(&self) -> AppResult<CategoryCatalog> {
        let filter = RecordFilter::new().with_field("type", HARVEST_COST_TYPE);
        let categories: Vec<CostCategory> =
            store::fetch_all(self.store.as_ref(), Collection::Categories, &filter).await?;
        tracing::debug!(count = categories.len(), "Loaded cost categories");
        Ok(CategoryCatalog::new(categories))
    }

    pub async fn get(&self, id: &CostCategoryId) -> AppResult<CostCategory> {
        store::fetch(self.store.as_ref(), Collection::Categories, id.as_str())
            .await
            .map_err(not_found_as("CostCategory"))
    }

    pub async fn list_active(&self) -> AppResult<Vec<CostCategory>> {
        Ok(self.catalog().await?.active().cloned().collect())
    }

    /// Active categories plus those the plan references
    pub async fn for_plan(&self, plan: &HarvestPlan) -> AppResult<Vec<CostCategory>> {
        let catalog = self.catalog().await?;
        Ok(catalog
            .for_plan(plan.referenced_categories())
            .into_iter()
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewCostCategory) -> AppResult<CostCategory> {
        if let Some(id) = &input.id {
            validate_id(id)?;
        }
        validate_name(&input.name)?;
        validate_estimated_cost(input.estimated_cost)?;

        let id = CostCategoryId::new(input.id.unwrap_or_else(new_record_id));
        let category = CostCategory::new(id, input.name, input.unit, input.estimated_cost);
        store::insert(self.store.as_ref(), Collection::Categories, &category).await?;

        tracing::info!(category_id = %category.id, "Cost category created");
        Ok(category)
    }

    /// Apply `change` to a stored category under its write guard
    async fn modify(
        &self,
        id: &CostCategoryId,
        change: impl FnOnce(&mut CostCategory) -> AppResult<()>,
    ) -> AppResult<CostCategory> {
        let _guard = self.locks.acquire(Collection::Categories, id.as_str()).await;
        let mut category = self.get(id).await?;
        change(&mut category)?;
        store::replace(self.store.as_ref(), Collection::Categories, id.as_str(), &category)
            .await?;
        Ok(category)
    }

    /// Change name, unit or default cost; existing plans keep their stored unit costs
    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: &CostCategoryId,
        update: CostCategoryUpdate,
    ) -> AppResult<CostCategory> {
        let category = self
            .modify(id, |category| {
                if let Some(name) = update.name {
                    validate_name(&name)?;
                    category.name = name;
                }
                if let Some(unit) = update.unit {
                    category.unit = unit;
                }
                if let Some(cost) = update.estimated_cost {
                    validate_estimated_cost(cost)?;
                    category.estimated_cost = cost;
                }
                Ok(())
            })
            .await?;
        tracing::info!(category_id = %id, "Cost category updated");
        Ok(category)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: &CostCategoryId) -> AppResult<CostCategory> {
        let category = self
            .modify(id, |category| {
                category.is_active = false;
                Ok(())
            })
            .await?;
        tracing::info!(category_id = %id, "Cost category deactivated");
        Ok(category)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reactivate(&self, id: &CostCategoryId) -> AppResult<CostCategory> {
        let category = self
            .modify(id, |category| {
                category.is_active = true;
                Ok(())
            })
            .await?;
        tracing::info!(category_id = %id, "Cost category reactivated");
        Ok(category)
    }

    /// Delete requests deactivate the category
    pub async fn delete(&self, id: &CostCategoryId) -> AppResult<CostCategory> {
        self.deactivate(id).await
    }
}
