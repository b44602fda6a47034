//! Inventory allocation service
//!
//! Every mutation runs under the item's write guard: load, apply one
//! allocator operation, write the recomputed record back.

use chrono::NaiveDate;
use shared::{
    new_record_id, summarize_valuation, Assignment, CoreResult, InventoryItem, InventoryMovement,
    InventoryRecord, LotId, NewInventoryItem, ValuationSummary,
};
use std::sync::Arc;

use super::{log_drift, not_found_as};
use crate::error::{AppError, AppResult};
use crate::locks::RecordLocks;
use crate::store::{self, Collection, RecordFilter, RecordStore};

/// Inventory service for allocating stock to growing lots
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn RecordStore>,
    locks: RecordLocks,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(store: Arc<dyn RecordStore>, locks: RecordLocks) -> Self {
        Self { store, locks }
    }

    pub(crate) fn decode(record: InventoryRecord) -> AppResult<InventoryItem> {
        let id = record.id.clone();
        let loaded = InventoryItem::from_record(record)?;
        Ok(log_drift(Collection::Inventory, &id, loaded))
    }

    /// Load one item, recomputing its derived fields
    pub async fn get_item(&self, id: &str) -> AppResult<InventoryItem> {
        let record: InventoryRecord = store::fetch(self.store.as_ref(), Collection::Inventory, id)
            .await
            .map_err(not_found_as("InventoryItem"))?;
        Self::decode(record)
    }

    pub async fn list_items(&self) -> AppResult<Vec<InventoryItem>> {
        let records: Vec<InventoryRecord> =
            store::fetch_all(self.store.as_ref(), Collection::Inventory, &RecordFilter::new())
                .await?;
        records.into_iter().map(Self::decode).collect()
    }

    /// Stock a new item with its whole quantity available
    #[tracing::instrument(skip(self, input), fields(name = %input.name, quantity = input.quantity))]
    pub async fn create_item(&self, input: NewInventoryItem) -> AppResult<InventoryItem> {
        let item = InventoryItem::create(new_record_id(), input)?;
        store::insert(self.store.as_ref(), Collection::Inventory, &item.to_record()).await?;

        tracing::info!(item_id = %item.id, "Inventory item created");
        Ok(item)
    }

    /// Apply one allocator operation to a stored item under its write guard
    async fn apply<T>(
        &self,
        item_id: &str,
        operation: impl FnOnce(&mut InventoryItem) -> CoreResult<T>,
    ) -> AppResult<(InventoryItem, T)> {
        let _guard = self.locks.acquire(Collection::Inventory, item_id).await;
        let mut item = self.get_item(item_id).await?;
        let output = operation(&mut item)?;
        store::replace(
            self.store.as_ref(),
            Collection::Inventory,
            item_id,
            &item.to_record(),
        )
        .await?;

        let breakdown = item.breakdown();
        tracing::debug!(
            item_id,
            status = %item.status(),
            available = breakdown.available,
            assigned = breakdown.assigned,
            maintenance = breakdown.maintenance,
            "Inventory item written"
        );
        Ok((item, output))
    }

    #[tracing::instrument(skip(self, notes))]
    pub async fn add_assignment(
        &self,
        item_id: &str,
        lot_id: LotId,
        quantity: u64,
        date: NaiveDate,
        notes: Option<String>,
    ) -> AppResult<InventoryItem> {
        let (item, _) = self
            .apply(item_id, |item| item.add_assignment(lot_id, quantity, date, notes))
            .await?;
        tracing::info!("Assignment added");
        Ok(item)
    }

    /// Remove a lot's assignment, returning the item and the removed assignment
    #[tracing::instrument(skip(self))]
    pub async fn remove_assignment(
        &self,
        item_id: &str,
        lot_id: &LotId,
    ) -> AppResult<(InventoryItem, Assignment)> {
        let result = self
            .apply(item_id, |item| item.remove_assignment(lot_id))
            .await?;
        tracing::info!(released = result.1.quantity, "Assignment removed");
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_assignment_quantity(
        &self,
        item_id: &str,
        lot_id: &LotId,
        quantity: u64,
    ) -> AppResult<InventoryItem> {
        let (item, _) = self
            .apply(item_id, |item| item.update_assignment_quantity(lot_id, quantity))
            .await?;
        tracing::info!("Assignment quantity updated");
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_maintenance_quantity(
        &self,
        item_id: &str,
        quantity: u64,
    ) -> AppResult<InventoryItem> {
        let (item, _) = self
            .apply(item_id, |item| item.set_maintenance_quantity(quantity))
            .await?;
        tracing::info!("Maintenance quantity set");
        Ok(item)
    }

    /// Return all assigned and maintenance stock to available
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, item_id: &str) -> AppResult<(InventoryItem, Vec<Assignment>)> {
        let result = self.apply(item_id, |item| Ok(item.release())).await?;
        tracing::info!(assignments = result.1.len(), "Inventory item released");
        Ok(result)
    }

    /// Replenish or correct the stocked total, logging the movement
    #[tracing::instrument(skip(self, reason))]
    pub async fn resize(
        &self,
        item_id: &str,
        new_total_quantity: u64,
        date: NaiveDate,
        reason: Option<String>,
    ) -> AppResult<InventoryItem> {
        let (item, _) = self
            .apply(item_id, |item| item.resize(new_total_quantity, date, reason))
            .await?;
        tracing::info!(movements = item.movements().len(), "Inventory item resized");
        Ok(item)
    }

    /// Stock history of one item, oldest first
    pub async fn movements(&self, item_id: &str) -> AppResult<Vec<InventoryMovement>> {
        Ok(self.get_item(item_id).await?.movements().to_vec())
    }

    #[tracing::instrument(skip(self, notes))]
    pub async fn register_consumption(
        &self,
        item_id: &str,
        lot_id: LotId,
        quantity: u64,
        date: NaiveDate,
        notes: Option<String>,
    ) -> AppResult<InventoryItem> {
        let (item, _) = self
            .apply(item_id, |item| {
                item.register_consumption(lot_id, quantity, date, notes)
            })
            .await?;
        tracing::info!("Consumption registered");
        Ok(item)
    }

    /// Delete an item that holds no assignment and no maintenance stock
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, item_id: &str) -> AppResult<()> {
        let _guard = self.locks.acquire(Collection::Inventory, item_id).await;
        let item = self.get_item(item_id).await?;
        if item.committed_quantity() > 0 {
            return Err(AppError::conflict(
                "inventory",
                format!(
                    "Item {} still has {} units assigned or in maintenance",
                    item.name,
                    item.committed_quantity()
                ),
                format!(
                    "El ítem {} aún tiene {} unidades asignadas o en mantenimiento",
                    item.name,
                    item.committed_quantity()
                ),
            ));
        }

        self.store.delete(Collection::Inventory, item_id).await?;
        tracing::info!("Inventory item deleted");
        Ok(())
    }

    /// Items whose available stock is at or below their minimum
    pub async fn low_stock(&self) -> AppResult<Vec<InventoryItem>> {
        let mut items = self.list_items().await?;
        items.retain(InventoryItem::is_low_stock);
        Ok(items)
    }

    /// Assignments held by a lot across all items
    pub async fn assignments_for_lot(
        &self,
        lot_id: &LotId,
    ) -> AppResult<Vec<(InventoryItem, Assignment)>> {
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .filter_map(|item| {
                let assignment = item.assignment(lot_id).cloned()?;
                Some((item, assignment))
            })
            .collect())
    }

    pub async fn valuation(&self) -> AppResult<ValuationSummary> {
        Ok(summarize_valuation(&self.list_items().await?))
    }
}
