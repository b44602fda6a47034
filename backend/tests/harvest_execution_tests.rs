//! Harvest plan execution tests
//!
//! Tests for plan orchestration over the in-memory record store including:
//! - Cost reconciliation of an executed plan
//! - Inventory consumption registered against the harvested lot
//! - Failed lot-quantity reduction reported without undoing the execution
//! - Rejected executions leaving every record untouched

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use scallop_planning::services::{LotSyncStatus, NewCostCategory, PlanFilter};
use scallop_planning::store::{Collection, LotQuantitySync, MemoryStore, RecordStore};
use scallop_planning::{telemetry, AppError, Config, PlanningServices};
use serde_json::json;
use shared::{
    AllocationStatus, CostCategoryId, CostEntry, CostMap, CoreError, CreatePlanInput,
    ExecutionInput, InventoryUsage, LotId, NewInventoryItem, PlanStatus, QuantityUnit,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Lot subsystem double recording every reduction
#[derive(Default)]
struct ScriptedLots {
    fail: bool,
    reductions: Mutex<Vec<(LotId, u64)>>,
}

impl ScriptedLots {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn reductions(&self) -> Vec<(LotId, u64)> {
        self.reductions.lock().unwrap().clone()
    }
}

#[async_trait]
impl LotQuantitySync for ScriptedLots {
    async fn reduce_lot_quantity(&self, lot_id: &LotId, amount: u64) -> anyhow::Result<()> {
        self.reductions.lock().unwrap().push((lot_id.clone(), amount));
        if self.fail {
            anyhow::bail!("lot service timed out");
        }
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    lots: Arc<ScriptedLots>,
    services: PlanningServices,
}

fn config() -> Config {
    Config::from_toml(
        r#"
        [conversions]
        conchitas_per_kg = 111

        [planning]
        upcoming_window_days = 14
        "#,
    )
    .unwrap()
}

async fn fixture(lots: ScriptedLots) -> Fixture {
    telemetry::init_test();
    let store = Arc::new(MemoryStore::new());
    let lots = Arc::new(lots);
    let services = PlanningServices::new(store.clone(), lots.clone(), &config()).unwrap();

    services
        .categories
        .create(NewCostCategory {
            id: Some("labor".into()),
            name: "Mano de obra".into(),
            unit: "jornal".into(),
            estimated_cost: Decimal::from(5),
        })
        .await
        .unwrap();
    services
        .categories
        .create(NewCostCategory {
            id: Some("transport".into()),
            name: "Transporte".into(),
            unit: "viaje".into(),
            estimated_cost: Decimal::from(80),
        })
        .await
        .unwrap();

    Fixture {
        store,
        lots,
        services,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn labor(quantity: i64) -> CostMap {
    [(
        CostCategoryId::from("labor"),
        CostEntry::new(Decimal::from(quantity), Some(Decimal::from(5))),
    )]
    .into_iter()
    .collect()
}

fn plan_input(planned_date: NaiveDate) -> CreatePlanInput {
    CreatePlanInput {
        sector_id: "sector-1".into(),
        lot_id: "lot-1".into(),
        planned_date,
        estimated_quantity: 1000.0,
        quantity_unit: QuantityUnit::Conchitas,
        estimated_mortality: 15.0,
        planned_costs: labor(10),
        notes: None,
        size_distribution: BTreeMap::new(),
    }
}

fn execution(costs: CostMap, inventory_used: Vec<InventoryUsage>) -> ExecutionInput {
    ExecutionInput {
        actual_quantity: 800.0,
        quantity_unit: QuantityUnit::Conchitas,
        actual_date: None,
        actual_costs: costs,
        inventory_used,
        notes: Some("Cosecha sin novedades".into()),
    }
}

fn bags(quantity: u64) -> NewInventoryItem {
    NewInventoryItem {
        category: "consumables".into(),
        name: "Mesh bags".into(),
        unit: "unidad".into(),
        unit_cost: Decimal::new(150, 2),
        quantity,
        min_stock: None,
        location: None,
        supplier: None,
    }
}

// ============================================================================
// Execution Tests
// ============================================================================

#[tokio::test]
async fn test_execution_reconciles_costs_and_syncs_lot() {
    let f = fixture(ScriptedLots::default()).await;
    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();
    assert_eq!(plan.survival_quantity(), 850);
    assert_eq!(plan.total_planned_cost(), Decimal::from(50));

    let result = f
        .services
        .harvest
        .execute_on(&plan.id, execution(labor(12), Vec::new()), date(2024, 7, 16))
        .await
        .unwrap();

    assert_eq!(result.plan.status(), PlanStatus::Completed);
    assert_eq!(result.plan.actual_date(), Some(date(2024, 7, 16)));
    assert_eq!(result.plan.total_actual_cost(), Some(Decimal::from(60)));
    let labor_line = result.reconciliation.line(&"labor".into()).unwrap();
    assert_eq!(labor_line.variance, Decimal::from(10));
    assert!(!result.reconciliation.within_budget);
    assert_eq!(result.outcome.quantity_variance, -50);
    assert_eq!(result.lot_sync, LotSyncStatus::Synced);
    assert_eq!(f.lots.reductions(), vec![(LotId::from("lot-1"), 800)]);

    let stored = f.store.get(Collection::HarvestPlans, &plan.id).await.unwrap().unwrap();
    assert_eq!(stored["status"], "completed");
    assert_eq!(stored["totalActualCost"], json!(60.0));
    assert_eq!(stored["survivalQuantity"], 850);
}

#[tokio::test]
async fn test_second_execution_is_invalid_transition() {
    let f = fixture(ScriptedLots::default()).await;
    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();
    f.services
        .harvest
        .execute_on(&plan.id, execution(labor(12), Vec::new()), date(2024, 7, 16))
        .await
        .unwrap();

    let err = f
        .services
        .harvest
        .execute_on(&plan.id, execution(labor(1), Vec::new()), date(2024, 7, 17))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Core(CoreError::InvalidTransition {
            from: PlanStatus::Completed,
            ..
        })
    ));
    assert_eq!(f.lots.reductions().len(), 1);
}

#[tokio::test]
async fn test_lot_sync_failure_keeps_plan_completed() {
    let f = fixture(ScriptedLots::failing()).await;
    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();

    let result = f
        .services
        .harvest
        .execute_on(&plan.id, execution(labor(10), Vec::new()), date(2024, 7, 16))
        .await
        .unwrap();
    assert!(matches!(result.lot_sync, LotSyncStatus::Failed { ref message } if message.contains("timed out")));

    let stored = f.services.harvest.get_plan(&plan.id).await.unwrap();
    assert_eq!(stored.status(), PlanStatus::Completed);
}

#[tokio::test]
async fn test_execution_registers_inventory_consumption() {
    let f = fixture(ScriptedLots::default()).await;
    let inventory = &f.services.inventory;
    let item = inventory.create_item(bags(100)).await.unwrap();
    inventory
        .add_assignment(&item.id, "lot-1".into(), 30, date(2024, 7, 1), None)
        .await
        .unwrap();

    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();
    let usage = vec![
        InventoryUsage {
            inventory_item_id: item.id.clone(),
            quantity: 25,
        },
        InventoryUsage {
            inventory_item_id: item.id.clone(),
            quantity: 15,
        },
    ];
    let result = f
        .services
        .harvest
        .execute_on(&plan.id, execution(labor(10), usage), date(2024, 7, 16))
        .await
        .unwrap();
    assert_eq!(result.materials_cost, Decimal::from(60));

    let stored = inventory.get_item(&item.id).await.unwrap();
    assert_eq!(stored.status(), AllocationStatus::Assigned);
    assert_eq!(stored.assignment(&"lot-1".into()).unwrap().quantity, 40);
    assert_eq!(stored.available_quantity(), 60);
}

#[tokio::test]
async fn test_insufficient_stock_rejects_execution_without_writes() {
    let f = fixture(ScriptedLots::default()).await;
    let inventory = &f.services.inventory;
    let plenty = inventory.create_item(bags(100)).await.unwrap();
    let scarce = inventory.create_item(bags(5)).await.unwrap();

    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();
    let usage = vec![
        InventoryUsage {
            inventory_item_id: plenty.id.clone(),
            quantity: 10,
        },
        InventoryUsage {
            inventory_item_id: scarce.id.clone(),
            quantity: 6,
        },
    ];
    let err = f
        .services
        .harvest
        .execute_on(&plan.id, execution(labor(10), usage), date(2024, 7, 16))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Core(CoreError::InsufficientStock {
            requested: 6,
            available: 5
        })
    ));

    assert_eq!(
        f.services.harvest.get_plan(&plan.id).await.unwrap().status(),
        PlanStatus::Planned
    );
    assert_eq!(inventory.get_item(&plenty.id).await.unwrap().assigned_quantity(), 0);
    assert!(f.lots.reductions().is_empty());
}

// ============================================================================
// Lifecycle and Query Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_then_execute_is_rejected() {
    let f = fixture(ScriptedLots::default()).await;
    let plan = f
        .services
        .harvest
        .create_plan(plan_input(date(2024, 7, 15)))
        .await
        .unwrap();
    let cancelled = f
        .services
        .harvest
        .cancel(&plan.id, Some("Marea roja".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status(), PlanStatus::Cancelled);

    assert!(matches!(
        f.services
            .harvest
            .execute_on(&plan.id, execution(labor(1), Vec::new()), date(2024, 7, 16))
            .await,
        Err(AppError::Core(CoreError::InvalidTransition { .. }))
    ));
    assert!(matches!(
        f.services.harvest.cancel("missing", None).await,
        Err(AppError::Core(CoreError::NotFound { entity: "HarvestPlan", .. }))
    ));
}

#[tokio::test]
async fn test_deactivated_category_still_reconciles() {
    let f = fixture(ScriptedLots::default()).await;
    let mut input = plan_input(date(2024, 7, 15));
    input
        .planned_costs
        .insert("transport".into(), CostEntry::new(Decimal::ONE, None));
    let plan = f.services.harvest.create_plan(input).await.unwrap();
    assert_eq!(plan.total_planned_cost(), Decimal::from(130));

    f.services
        .categories
        .delete(&"transport".into())
        .await
        .unwrap();

    let shown = f.services.harvest.categories_for_plan(&plan.id).await.unwrap();
    assert!(shown.iter().any(|c| c.id.as_str() == "transport" && !c.is_active));

    let report = f.services.harvest.reconciliation(&plan.id).await.unwrap();
    let transport = report.line(&"transport".into()).unwrap();
    assert_eq!(transport.name, "Transporte");
    assert_eq!(transport.planned_subtotal, Decimal::from(80));
}

#[tokio::test]
async fn test_upcoming_calendar_and_filters() {
    let f = fixture(ScriptedLots::default()).await;
    let harvest = &f.services.harvest;
    let soon = harvest.create_plan(plan_input(date(2024, 7, 15))).await.unwrap();
    let mut later = plan_input(date(2024, 8, 30));
    later.sector_id = "sector-2".into();
    harvest.create_plan(later).await.unwrap();

    let due = harvest.upcoming(date(2024, 7, 10)).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, soon.id);

    let months = harvest.calendar().await.unwrap();
    assert_eq!(months.keys().cloned().collect::<Vec<_>>(), vec!["2024-07", "2024-08"]);

    let in_sector = harvest
        .list_plans(&PlanFilter {
            sector_id: Some("sector-2".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(in_sector.len(), 1);
    assert_eq!(in_sector[0].planned_date, date(2024, 8, 30));
}

#[tokio::test]
async fn test_spanish_status_plans_are_listed_and_upcoming() {
    let f = fixture(ScriptedLots::default()).await;
    f.store
        .create(
            Collection::HarvestPlans,
            json!({
                "id": "legacy-2",
                "sectorId": "sector-1",
                "lotId": "lot-4",
                "status": "planificado",
                "plannedDate": "2024-07-12",
                "estimatedQuantity": 500,
                "estimatedMortality": 0
            }),
        )
        .await
        .unwrap();
    f.store
        .create(
            Collection::HarvestPlans,
            json!({
                "id": "legacy-3",
                "sectorId": "sector-1",
                "lotId": "lot-5",
                "status": "completado",
                "plannedDate": "2024-07-13",
                "estimatedQuantity": 500,
                "estimatedMortality": 0
            }),
        )
        .await
        .unwrap();

    let harvest = &f.services.harvest;
    let due = harvest.upcoming(date(2024, 7, 10)).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, "legacy-2");

    let planned = harvest
        .list_plans(&PlanFilter {
            status: Some(PlanStatus::Planned),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].id, "legacy-2");

    let completed = harvest
        .list_plans(&PlanFilter {
            sector_id: Some("sector-1".into()),
            status: Some(PlanStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, "legacy-3");
}

#[tokio::test]
async fn test_legacy_plan_record_is_repaired_on_read() {
    let f = fixture(ScriptedLots::default()).await;
    f.store
        .create(
            Collection::HarvestPlans,
            json!({
                "id": "legacy-1",
                "sectorId": "sector-1",
                "lotId": "lot-9",
                "status": "planned",
                "plannedDate": "2024-07-20",
                "estimatedQuantity": "2000",
                "estimatedMortality": 10,
                "survivalQuantity": 1500,
                "plannedCosts": { "labor": { "quantity": 4 } },
                "totalPlannedCost": 0
            }),
        )
        .await
        .unwrap();

    let plan = f.services.harvest.get_plan("legacy-1").await.unwrap();
    assert_eq!(plan.survival_quantity(), 1800);
    assert_eq!(plan.total_planned_cost(), Decimal::from(20));
}

#[tokio::test]
async fn test_revenue_estimate_from_size_distribution() {
    let f = fixture(ScriptedLots::default()).await;
    f.store
        .create(
            Collection::Pricing,
            json!({ "id": "price-m", "sizeCategory": "M", "pricePerUnit": 1.2, "currency": "PEN", "isActive": true }),
        )
        .await
        .unwrap();

    let mut input = plan_input(date(2024, 7, 15));
    input.size_distribution = [("M".to_string(), 500)].into_iter().collect();
    let plan = f.services.harvest.create_plan(input).await.unwrap();

    let (revenue, currency) = f.services.harvest.estimated_revenue(&plan.id).await.unwrap();
    assert_eq!(revenue, Decimal::from(600));
    assert_eq!(currency, "PEN");
}
