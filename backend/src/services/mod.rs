//! Planning services for the Scallop Planning backend
//!
//! Each service loads typed values from the record store, applies one core
//! operation and writes the recomputed records back while holding the write
//! guards of those records.

pub mod category;
pub mod harvest;
pub mod inventory;
pub mod pricing;

pub use category::{CostCategoryService, CostCategoryUpdate, NewCostCategory};
pub use harvest::{ExecutionOutcome, HarvestPlanService, LotSyncStatus, PlanFilter};
pub use inventory::InventoryService;
pub use pricing::PricingService;

use shared::{CoreError, Loaded};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::locks::RecordLocks;
use crate::store::{Collection, LotQuantitySync, RecordStore, StoreError};

/// All planning services over one store, sharing one lock registry
#[derive(Clone)]
pub struct PlanningServices {
    pub inventory: InventoryService,
    pub categories: CostCategoryService,
    pub pricing: PricingService,
    pub harvest: HarvestPlanService,
}

impl PlanningServices {
    pub fn new(
        store: Arc<dyn RecordStore>,
        lot_sync: Arc<dyn LotQuantitySync>,
        config: &Config,
    ) -> AppResult<Self> {
        let locks = RecordLocks::new();
        let categories = CostCategoryService::new(store.clone(), locks.clone());
        let pricing = PricingService::new(store.clone());
        let harvest = HarvestPlanService::new(
            store.clone(),
            locks.clone(),
            lot_sync,
            categories.clone(),
            pricing.clone(),
            config.converter()?,
            config.planning.clone(),
        );

        Ok(Self {
            inventory: InventoryService::new(store, locks),
            categories,
            pricing,
            harvest,
        })
    }
}

/// Map a missing record to the core `NotFound` kind for `entity`
pub(crate) fn not_found_as(entity: &'static str) -> impl Fn(StoreError) -> AppError {
    move |err| match err {
        StoreError::NotFound { id, .. } => CoreError::not_found(entity, id).into(),
        other => other.into(),
    }
}

/// Unwrap a loaded value, logging every repaired derived field
pub(crate) fn log_drift<T>(collection: Collection, id: &str, loaded: Loaded<T>) -> T {
    for drift in &loaded.drift {
        tracing::warn!(
            collection = %collection,
            id,
            field = %drift.field,
            stored = %drift.stored,
            derived = %drift.derived,
            "Stored value disagrees with derivation, using derived value"
        );
    }
    loaded.value
}
