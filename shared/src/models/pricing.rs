//! Sale pricing models and revenue estimation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::allocation::value_of;
use crate::models::HarvestPlan;

fn active_by_default() -> bool {
    true
}

/// `pricing` collection record; read-only for the planning core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Size class such as XS, S, M, L, XL
    pub size_category: String,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub price_per_kg: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

/// Active prices by size category
#[derive(Debug, Clone, Default)]
pub struct PriceList {
    prices: BTreeMap<String, PricingRecord>,
}

impl PriceList {
    /// Build from pricing records, ignoring inactive ones.
    ///
    /// When several active records share a size category the last one wins.
    pub fn new(records: impl IntoIterator<Item = PricingRecord>) -> Self {
        Self {
            prices: records
                .into_iter()
                .filter(|r| r.is_active)
                .map(|r| (r.size_category.clone(), r))
                .collect(),
        }
    }

    pub fn price_for(&self, size_category: &str) -> Option<&PricingRecord> {
        self.prices.get(size_category)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// `Σ units × pricePerUnit`; unknown sizes contribute nothing
    pub fn estimate_revenue(&self, distribution: &BTreeMap<String, u64>) -> Decimal {
        distribution
            .iter()
            .filter_map(|(size, units)| {
                self.price_for(size)
                    .map(|price| value_of(price.price_per_unit, *units))
            })
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// `kg × pricePerKg`, when the size category has a per-kg price
    pub fn estimate_revenue_by_weight(&self, size_category: &str, kg: Decimal) -> Option<Decimal> {
        self.price_for(size_category)?
            .price_per_kg
            .map(|price| price.saturating_mul(kg))
    }
}

impl HarvestPlan {
    /// Expected revenue of the plan's size distribution
    pub fn estimated_revenue(&self, prices: &PriceList) -> Decimal {
        prices.estimate_revenue(&self.size_distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(size: &str, per_unit: Decimal, per_kg: Option<Decimal>, active: bool) -> PricingRecord {
        PricingRecord {
            id: None,
            size_category: size.into(),
            price_per_unit: per_unit,
            price_per_kg: per_kg,
            currency: Some("PEN".into()),
            is_active: active,
        }
    }

    fn prices() -> PriceList {
        PriceList::new([
            price("S", Decimal::new(8, 1), None, true),
            price("M", Decimal::new(12, 1), Some(Decimal::from(30)), true),
            price("XL", Decimal::new(25, 1), None, false),
        ])
    }

    #[test]
    fn test_revenue_ignores_inactive_and_unknown_sizes() {
        let distribution: BTreeMap<String, u64> = [
            ("S".to_string(), 100),
            ("M".to_string(), 200),
            ("XL".to_string(), 50),
            ("XXL".to_string(), 10),
        ]
        .into_iter()
        .collect();

        // 100 × 0.8 + 200 × 1.2
        assert_eq!(prices().estimate_revenue(&distribution), Decimal::from(320));
    }

    #[test]
    fn test_revenue_by_weight() {
        let prices = prices();
        assert_eq!(
            prices.estimate_revenue_by_weight("M", Decimal::new(25, 1)),
            Some(Decimal::from(75))
        );
        assert_eq!(prices.estimate_revenue_by_weight("S", Decimal::ONE), None);
        assert_eq!(prices.estimate_revenue_by_weight("XL", Decimal::ONE), None);
    }

    #[test]
    fn test_record_defaults_to_active() {
        let record: PricingRecord = serde_json::from_value(serde_json::json!({
            "sizeCategory": "L",
            "pricePerUnit": 1.8,
            "currency": "PEN"
        }))
        .unwrap();
        assert!(record.is_active);
        assert_eq!(record.price_per_kg, None);
    }
}
