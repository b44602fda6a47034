//! Revenue estimation from `pricing` records
//!
//! Pricing records are owned by the surrounding application; this service
//! only reads them.

use rust_decimal::Decimal;
use shared::{PriceList, PricingRecord};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppResult;
use crate::store::{self, Collection, RecordFilter, RecordStore};

/// Pricing service
#[derive(Clone)]
pub struct PricingService {
    store: Arc<dyn RecordStore>,
}

impl PricingService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Active prices by size category
    pub async fn price_list(&self) -> AppResult<PriceList> {
        let records: Vec<PricingRecord> =
            store::fetch_all(self.store.as_ref(), Collection::Pricing, &RecordFilter::new())
                .await?;
        Ok(PriceList::new(records))
    }

    /// Revenue of a size distribution at current active prices
    pub async fn estimate_revenue(&self, distribution: &BTreeMap<String, u64>) -> AppResult<Decimal> {
        Ok(self.price_list().await?.estimate_revenue(distribution))
    }

    pub async fn estimate_revenue_by_weight(
        &self,
        size_category: &str,
        kg: Decimal,
    ) -> AppResult<Option<Decimal>> {
        Ok(self
            .price_list()
            .await?
            .estimate_revenue_by_weight(size_category, kg))
    }
}
