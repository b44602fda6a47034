//! Harvest plan service
//!
//! Orchestrates plan creation, execution and cancellation over the record
//! store. Execution validates the plan transition and every inventory
//! consumption before writing anything, then writes the items, the plan and
//! finally asks the lot subsystem to reduce the harvested lot.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    calendar, consume_inventory, materials_cost, new_record_id, upcoming, CostCategory,
    CostLedger, CreatePlanInput, ExecutionInput, HarvestOutcome, HarvestPlan, HarvestPlanRecord,
    InventoryItem, InventoryRecord, LotId, PlanStatus, Reconciliation, UnitConverter,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{log_drift, not_found_as, CostCategoryService, InventoryService, PricingService};
use crate::config::PlanningConfig;
use crate::error::{AppError, AppResult};
use crate::locks::RecordLocks;
use crate::store::{self, Collection, LotQuantitySync, RecordFilter, RecordStore};

/// Filter for listing plans
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub sector_id: Option<String>,
    pub lot_id: Option<LotId>,
    pub status: Option<PlanStatus>,
}

impl PlanFilter {
    /// Store-side part of the filter. Status is matched after decoding, since
    /// stored records may carry any accepted status spelling.
    fn to_record_filter(&self) -> RecordFilter {
        let mut filter = RecordFilter::new();
        if let Some(sector_id) = &self.sector_id {
            filter = filter.with_field("sectorId", sector_id.as_str());
        }
        if let Some(lot_id) = &self.lot_id {
            filter = filter.with_field("lotId", lot_id.as_str());
        }
        filter
    }

    fn matches_status(&self, plan: &HarvestPlan) -> bool {
        self.status.map_or(true, |status| plan.status() == status)
    }
}

/// Result of the lot-quantity reduction that follows an execution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LotSyncStatus {
    Synced,
    Failed { message: String },
}

/// A completed plan with its reconciliation
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub plan: HarvestPlan,
    pub reconciliation: Reconciliation,
    pub outcome: HarvestOutcome,
    pub materials_cost: Decimal,
    /// The plan stays completed even when the lot could not be reduced
    pub lot_sync: LotSyncStatus,
}

/// Harvest plan service
#[derive(Clone)]
pub struct HarvestPlanService {
    store: Arc<dyn RecordStore>,
    locks: RecordLocks,
    lot_sync: Arc<dyn LotQuantitySync>,
    categories: CostCategoryService,
    pricing: PricingService,
    converter: UnitConverter,
    planning: PlanningConfig,
}

impl HarvestPlanService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        locks: RecordLocks,
        lot_sync: Arc<dyn LotQuantitySync>,
        categories: CostCategoryService,
        pricing: PricingService,
        converter: UnitConverter,
        planning: PlanningConfig,
    ) -> Self {
        Self {
            store,
            locks,
            lot_sync,
            categories,
            pricing,
            converter,
            planning,
        }
    }

    fn decode(record: HarvestPlanRecord, ledger: &CostLedger<'_>) -> AppResult<HarvestPlan> {
        let id = record.id.clone();
        let loaded = record.into_plan(ledger)?;
        Ok(log_drift(Collection::HarvestPlans, &id, loaded))
    }

    async fn load(&self, plan_id: &str, ledger: &CostLedger<'_>) -> AppResult<HarvestPlan> {
        let record: HarvestPlanRecord =
            store::fetch(self.store.as_ref(), Collection::HarvestPlans, plan_id)
                .await
                .map_err(not_found_as("HarvestPlan"))?;
        Self::decode(record, ledger)
    }

    async fn write(&self, plan: &HarvestPlan) -> AppResult<()> {
        store::replace(
            self.store.as_ref(),
            Collection::HarvestPlans,
            &plan.id,
            &HarvestPlanRecord::from(plan),
        )
        .await?;
        Ok(())
    }

    pub async fn get_plan(&self, plan_id: &str) -> AppResult<HarvestPlan> {
        let catalog = self.categories.catalog().await?;
        self.load(plan_id, &CostLedger::new(&catalog)).await
    }

    /// Plans matching the filter, ordered by id
    pub async fn list_plans(&self, filter: &PlanFilter) -> AppResult<Vec<HarvestPlan>> {
        let catalog = self.categories.catalog().await?;
        let ledger = CostLedger::new(&catalog);
        let records: Vec<HarvestPlanRecord> = store::fetch_all(
            self.store.as_ref(),
            Collection::HarvestPlans,
            &filter.to_record_filter(),
        )
        .await?;
        let mut plans = records
            .into_iter()
            .map(|record| Self::decode(record, &ledger))
            .collect::<AppResult<Vec<_>>>()?;
        plans.retain(|plan| filter.matches_status(plan));
        Ok(plans)
    }

    /// Create a plan in `planned` status
    #[tracing::instrument(skip(self, input), fields(lot_id = %input.lot_id, sector_id = %input.sector_id))]
    pub async fn create_plan(&self, input: CreatePlanInput) -> AppResult<HarvestPlan> {
        let catalog = self.categories.catalog().await?;
        let plan = HarvestPlan::create(
            new_record_id(),
            input,
            &self.converter,
            &CostLedger::new(&catalog),
        )?;
        store::insert(
            self.store.as_ref(),
            Collection::HarvestPlans,
            &HarvestPlanRecord::from(&plan),
        )
        .await?;

        tracing::info!(
            plan_id = %plan.id,
            estimated_quantity = plan.estimated_quantity(),
            survival_quantity = plan.survival_quantity(),
            total_planned_cost = %plan.total_planned_cost(),
            "Harvest plan created"
        );
        Ok(plan)
    }

    /// Execute a plan today
    pub async fn execute(&self, plan_id: &str, input: ExecutionInput) -> AppResult<ExecutionOutcome> {
        self.execute_on(plan_id, input, Utc::now().date_naive()).await
    }

    /// Execute a plan, dating it `today` when the input carries no actual date.
    ///
    /// Fails without writing anything when the plan is not `planned`, the
    /// input is invalid or any inventory item cannot cover its consumption.
    /// A failed lot-quantity reduction does not undo the execution; it is
    /// reported in the outcome.
    #[tracing::instrument(skip(self, input))]
    pub async fn execute_on(
        &self,
        plan_id: &str,
        input: ExecutionInput,
        today: NaiveDate,
    ) -> AppResult<ExecutionOutcome> {
        let catalog = self.categories.catalog().await?;
        let ledger = CostLedger::new(&catalog);

        let (plan, materials) = {
            let _plan_guard = self.locks.acquire(Collection::HarvestPlans, plan_id).await;
            let mut plan = self.load(plan_id, &ledger).await?;
            plan.execute(input, today, &self.converter, &ledger)?;

            let usage = plan.consolidated_usage();
            let _item_guards = self
                .locks
                .acquire_many(Collection::Inventory, usage.keys().cloned())
                .await;
            let originals = self.load_items(usage.keys()).await?;
            let mut items = originals.clone();
            consume_inventory(&plan, &mut items)?;
            let materials = materials_cost(&plan, &items);

            self.write_items(&originals, &items).await?;
            if let Err(err) = self.write(&plan).await {
                self.restore_items(&originals).await;
                return Err(err);
            }
            (plan, materials)
        };

        let reconciliation = plan.reconcile(&ledger)?;
        let outcome = plan
            .outcome()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("executed plan has no outcome")))?;
        tracing::info!(
            plan_id,
            actual_quantity = outcome.actual_quantity,
            total_actual_cost = %reconciliation.total_actual,
            within_budget = reconciliation.within_budget,
            "Harvest plan executed"
        );

        let lot_sync = match self
            .lot_sync
            .reduce_lot_quantity(&plan.lot_id, outcome.actual_quantity)
            .await
        {
            Ok(()) => LotSyncStatus::Synced,
            Err(err) => {
                tracing::warn!(
                    plan_id,
                    lot_id = %plan.lot_id,
                    error = %err,
                    "Lot quantity reduction failed, plan stays completed"
                );
                LotSyncStatus::Failed {
                    message: format!("{:#}", err),
                }
            }
        };

        Ok(ExecutionOutcome {
            plan,
            reconciliation,
            outcome,
            materials_cost: materials,
            lot_sync,
        })
    }

    async fn load_items<'a>(
        &self,
        ids: impl Iterator<Item = &'a String>,
    ) -> AppResult<BTreeMap<String, InventoryItem>> {
        let mut items = BTreeMap::new();
        for id in ids {
            let record: InventoryRecord =
                store::fetch(self.store.as_ref(), Collection::Inventory, id)
                    .await
                    .map_err(not_found_as("InventoryItem"))?;
            items.insert(id.clone(), InventoryService::decode(record)?);
        }
        Ok(items)
    }

    /// Write every changed item; on a store failure put back those already written
    async fn write_items(
        &self,
        originals: &BTreeMap<String, InventoryItem>,
        items: &BTreeMap<String, InventoryItem>,
    ) -> AppResult<()> {
        let mut written = BTreeMap::new();
        for (id, item) in items {
            let result = store::replace(
                self.store.as_ref(),
                Collection::Inventory,
                id,
                &item.to_record(),
            )
            .await;
            if let Err(err) = result {
                self.restore_items(&written).await;
                return Err(err.into());
            }
            if let Some(original) = originals.get(id) {
                written.insert(id.clone(), original.clone());
            }
        }
        Ok(())
    }

    async fn restore_items(&self, originals: &BTreeMap<String, InventoryItem>) {
        for (id, item) in originals {
            if let Err(err) = store::replace(
                self.store.as_ref(),
                Collection::Inventory,
                id,
                &item.to_record(),
            )
            .await
            {
                tracing::error!(item_id = %id, error = %err, "Failed to restore inventory item");
            }
        }
    }

    /// Abandon a planned harvest
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(&self, plan_id: &str, reason: Option<String>) -> AppResult<HarvestPlan> {
        let catalog = self.categories.catalog().await?;
        let _guard = self.locks.acquire(Collection::HarvestPlans, plan_id).await;
        let mut plan = self.load(plan_id, &CostLedger::new(&catalog)).await?;
        plan.cancel(reason)?;
        self.write(&plan).await?;

        tracing::info!("Harvest plan cancelled");
        Ok(plan)
    }

    /// Planned vs actual costs of a plan
    pub async fn reconciliation(&self, plan_id: &str) -> AppResult<Reconciliation> {
        let catalog = self.categories.catalog().await?;
        let ledger = CostLedger::new(&catalog);
        let plan = self.load(plan_id, &ledger).await?;
        Ok(plan.reconcile(&ledger)?)
    }

    /// Cost categories to show for a plan
    pub async fn categories_for_plan(&self, plan_id: &str) -> AppResult<Vec<CostCategory>> {
        let plan = self.get_plan(plan_id).await?;
        self.categories.for_plan(&plan).await
    }

    /// Planned harvests due within the configured window from `today`
    pub async fn upcoming(&self, today: NaiveDate) -> AppResult<Vec<HarvestPlan>> {
        let plans = self
            .list_plans(&PlanFilter {
                status: Some(PlanStatus::Planned),
                ..Default::default()
            })
            .await?;
        Ok(upcoming(&plans, today, self.planning.upcoming_window_days)
            .into_iter()
            .cloned()
            .collect())
    }

    /// All plans grouped by `YYYY-MM` of their planned date
    pub async fn calendar(&self) -> AppResult<BTreeMap<String, Vec<HarvestPlan>>> {
        let plans = self.list_plans(&PlanFilter::default()).await?;
        Ok(calendar(&plans)
            .into_iter()
            .map(|(month, plans)| (month, plans.into_iter().cloned().collect::<Vec<_>>()))
            .collect())
    }

    /// Expected revenue of a plan's size distribution, in the configured currency
    pub async fn estimated_revenue(&self, plan_id: &str) -> AppResult<(Decimal, String)> {
        let plan = self.get_plan(plan_id).await?;
        let prices = self.pricing.price_list().await?;
        Ok((plan.estimated_revenue(&prices), self.planning.currency.clone()))
    }
}
