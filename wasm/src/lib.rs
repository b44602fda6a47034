//! WebAssembly module for the Scallop Planning Platform
//!
//! Provides client-side computation for:
//! - Quantity conversion between conchitas, manojos, mallas and kg
//! - Survival projection
//! - Allocation status preview
//! - Cost totals and budget checks for offline plan editing

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{survival, CategoryCatalog, CostLedger, UnitConverter};

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

fn parse_unit(unit: &str) -> Result<QuantityUnit, JsValue> {
    unit.parse().map_err(|e| js_error(unit, e))
}

fn converter(conchitas_per_kg: f64) -> Result<UnitConverter, JsValue> {
    UnitConverter::new(conchitas_per_kg).map_err(|e| js_error("Invalid conversion factor", e))
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a quantity between two units
#[wasm_bindgen]
pub fn convert_quantity(
    value: f64,
    from: &str,
    to: &str,
    conchitas_per_kg: f64,
) -> Result<f64, JsValue> {
    let converter = converter(conchitas_per_kg)?;
    Ok(converter.convert(value, parse_unit(from)?, parse_unit(to)?))
}

/// Whole conchitas for a quantity in any unit
#[wasm_bindgen]
pub fn to_conchitas(value: f64, from: &str, conchitas_per_kg: f64) -> Result<f64, JsValue> {
    let converter = converter(conchitas_per_kg)?;
    Ok(converter.to_conchitas(value, parse_unit(from)?) as f64)
}

/// All four representations as JSON: `{"manojos", "conchas", "mallas", "kg"}`
#[wasm_bindgen]
pub fn all_conversions(value: f64, from: &str, conchitas_per_kg: f64) -> Result<String, JsValue> {
    let converter = converter(conchitas_per_kg)?;
    let conversions = converter.all_conversions(value, parse_unit(from)?);
    serde_json::to_string(&conversions).map_err(|e| js_error("Serialization failed", e))
}

/// Expected survivors after mortality
#[wasm_bindgen]
pub fn project_survival(estimated_quantity: f64, mortality_percent: f64) -> f64 {
    survival::project(estimated_quantity, mortality_percent) as f64
}

#[wasm_bindgen]
pub fn is_valid_mortality(mortality_percent: f64) -> bool {
    validate_mortality_percent(mortality_percent).is_ok()
}

/// Allocation status label for the given committed quantities
#[wasm_bindgen]
pub fn allocation_status(assigned: f64, maintenance: f64) -> String {
    AllocationStatus::derive(assigned.max(0.0) as u64, maintenance.max(0.0) as u64).to_string()
}

#[derive(Deserialize)]
struct BudgetInput {
    #[serde(default)]
    categories: Vec<CostCategory>,
    #[serde(default)]
    planned: CostMap,
    #[serde(default)]
    actual: CostMap,
}

/// Cost computations behind the JSON bindings; errors are plain messages
mod budget {
    use super::*;

    fn parse(input_json: &str) -> Result<BudgetInput, String> {
        serde_json::from_str(input_json).map_err(|e| format!("Invalid budget JSON: {}", e))
    }

    pub fn total(input_json: &str) -> Result<Decimal, String> {
        let input = parse(input_json)?;
        let catalog = CategoryCatalog::new(input.categories);
        CostLedger::new(&catalog)
            .total(&input.planned)
            .map_err(|e| format!("Cannot total costs: {}", e))
    }

    pub fn within_budget(input_json: &str) -> Result<bool, String> {
        let input = parse(input_json)?;
        let catalog = CategoryCatalog::new(input.categories);
        CostLedger::new(&catalog)
            .within_budget(&input.planned, &input.actual)
            .map_err(|e| format!("Cannot compare costs: {}", e))
    }

    pub fn reconcile(input_json: &str) -> Result<String, String> {
        let input = parse(input_json)?;
        let catalog = CategoryCatalog::new(input.categories);
        let report = CostLedger::new(&catalog)
            .reconcile(&input.planned, &input.actual)
            .map_err(|e| format!("Cannot reconcile costs: {}", e))?;
        serde_json::to_string(&report).map_err(|e| format!("Serialization failed: {}", e))
    }
}

/// Total of a cost map, resolving missing unit costs from the categories.
///
/// Input: `{"categories": [...], "planned": {"<categoryId>": {"quantity", "unitCost"?}}}`
#[wasm_bindgen]
pub fn calculate_cost_total(input_json: &str) -> Result<f64, JsValue> {
    budget::total(input_json)
        .map(to_f64)
        .map_err(|e| JsValue::from_str(&e))
}

/// Whether the actual costs stay within the planned total
#[wasm_bindgen]
pub fn check_within_budget(input_json: &str) -> Result<bool, JsValue> {
    budget::within_budget(input_json).map_err(|e| JsValue::from_str(&e))
}

/// Per-category reconciliation as JSON
#[wasm_bindgen]
pub fn reconcile_costs(input_json: &str) -> Result<String, JsValue> {
    budget::reconcile(input_json).map_err(|e| JsValue::from_str(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: &str = r#"{
        "categories": [
            { "id": "labor", "name": "Mano de obra", "unit": "jornal", "estimatedCost": 5 }
        ],
        "planned": { "labor": { "quantity": 10 } },
        "actual": { "labor": { "quantity": 12, "unitCost": 5 } }
    }"#;

    #[test]
    fn test_convert_quantity() {
        assert_eq!(convert_quantity(2.0, "mallas", "conchitas", 111.0).unwrap(), 576.0);
        assert_eq!(to_conchitas(1.5, "kg", 111.0).unwrap(), 167.0);
        assert!((convert_quantity(192.0, "conchas", "manojos", 111.0).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_conversions_json() {
        let json = all_conversions(1.0, "malla", 111.0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["conchas"], 288);
        assert_eq!(value["manojos"], 3.0);
    }

    #[test]
    fn test_project_survival() {
        assert_eq!(project_survival(1000.0, 15.0), 850.0);
        assert_eq!(project_survival(-5.0, 10.0), 0.0);
        assert!(is_valid_mortality(100.0));
        assert!(!is_valid_mortality(101.0));
    }

    #[test]
    fn test_allocation_status() {
        assert_eq!(allocation_status(0.0, 0.0), "available");
        assert_eq!(allocation_status(30.0, 0.0), "assigned");
        assert_eq!(allocation_status(0.0, 5.0), "maintenance");
        assert_eq!(allocation_status(30.0, 20.0), "mixed");
    }

    #[test]
    fn test_cost_total_and_budget() {
        assert_eq!(calculate_cost_total(BUDGET).unwrap(), 50.0);
        assert!(!check_within_budget(BUDGET).unwrap());

        let report: serde_json::Value =
            serde_json::from_str(&reconcile_costs(BUDGET).unwrap()).unwrap();
        assert_eq!(report["totalVariance"], 10.0);
    }

    #[test]
    fn test_unrepresentable_cost_total_is_error() {
        let input = r#"{
            "planned": { "labor": { "quantity": 1e15, "unitCost": 1e15 } }
        }"#;
        assert!(budget::total(input).unwrap_err().contains("Cannot total costs"));
        assert!(budget::within_budget(input).is_err());
        assert!(budget::reconcile(input).is_err());
        assert!(budget::total("{ not json").unwrap_err().starts_with("Invalid budget JSON"));
    }
}
