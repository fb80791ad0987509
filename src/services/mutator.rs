//! Stock Mutator
//!
//! The only writer of stock counters. Every operation funnels into
//! [`StockMutator::apply`]: validate input, lock the products, re-read the
//! records, plan the movements, then commit counters and ledger together.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use crate::domain::aggregates::stock::{validate_adjustment, validate_threshold};
use crate::domain::aggregates::{LedgerEntry, NewProduct, OrderLine, PlannedMovement, Reference, StockRecord};
use crate::domain::events::InventoryEvent;
use crate::domain::value_objects::{Actor, ProductId, Quantity};
use crate::services::locks::ProductLocks;
use crate::services::notify::EventSink;
use crate::store::InventoryStore;
use crate::{InventoryError, Result, Shortage};

/// Counter values around one movement. `entry_id` is `None` when the
/// operation turned out to be a no-op (adjusting to the current value).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub stock_before: i64,
    pub stock_after: i64,
    pub entry_id: Option<Uuid>,
}

impl From<&LedgerEntry> for StockChange {
    fn from(e: &LedgerEntry) -> Self {
        Self { product_id: e.product_id, stock_before: e.stock_before, stock_after: e.stock_after, entry_id: Some(e.id) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdjustItem { pub product_id: ProductId, pub quantity: i64, pub reason: String }

#[derive(Debug)]
pub struct BulkAdjustResult { pub product_id: ProductId, pub result: Result<StockChange> }

pub struct StockMutator {
    store: Arc<dyn InventoryStore>,
    sink: Arc<dyn EventSink>,
    locks: ProductLocks,
    default_threshold: i64,
}

impl StockMutator {
    pub fn new(store: Arc<dyn InventoryStore>, sink: Arc<dyn EventSink>, lock_timeout: Duration, default_threshold: i64) -> Self {
        Self { store, sink, locks: ProductLocks::new(lock_timeout), default_threshold }
    }

    pub fn store(&self) -> Arc<dyn InventoryStore> { self.store.clone() }

    #[tracing::instrument(skip(self, product), fields(product_id = %product.product_id))]
    pub async fn register_product(&self, product: NewProduct) -> Result<StockRecord> {
        let record = product.into_record(self.default_threshold)?;
        let record = self.store.insert_product(record).await?;
        tracing::info!(threshold = record.stock_alert_threshold, "product registered for stock tracking");
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_alert_threshold(&self, product_id: ProductId, threshold: i64) -> Result<StockRecord> {
        validate_threshold(threshold)?;
        self.ensure_exists(&[product_id]).await?;
        let _guard = self.locks.acquire(product_id).await?;
        self.store.set_alert_threshold(product_id, threshold).await
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn deduct(&self, product_id: ProductId, quantity: i64, reference: Reference, actor: Actor) -> Result<StockChange> {
        let quantity = Quantity::new(quantity)?;
        let (_, entries) = self.apply(&[product_id], |records| {
            Ok(vec![records[&product_id].plan_deduct(quantity, Some(reference), actor)?])
        }).await?;
        Ok(StockChange::from(&entries[0]))
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn add(&self, product_id: ProductId, quantity: i64, reference: Reference, actor: Actor) -> Result<StockChange> {
        let quantity = Quantity::new(quantity)?;
        let (_, entries) = self.apply(&[product_id], |records| {
            Ok(vec![records[&product_id].plan_add(quantity, Some(reference), actor)?])
        }).await?;
        Ok(StockChange::from(&entries[0]))
    }

    /// Sets stock to exactly `new_quantity`; the ledger records the signed difference.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn adjust(&self, product_id: ProductId, new_quantity: i64, reason: &str, actor: Actor) -> Result<StockChange> {
        let reason = validate_adjustment(new_quantity, reason)?;
        let (records, entries) = self.apply(&[product_id], |records| {
            Ok(records[&product_id].plan_adjust(new_quantity, reason, actor).into_iter().collect())
        }).await?;
        match entries.first() {
            Some(entry) => Ok(StockChange::from(entry)),
            None => {
                let stock = records[&product_id].stock;
                tracing::debug!(%product_id, stock, "adjustment matches current stock, nothing written");
                Ok(StockChange { product_id, stock_before: stock, stock_after: stock, entry_id: None })
            }
        }
    }

    /// Each item is its own atomic adjustment; a failure never rolls back
    /// earlier items.
    pub async fn bulk_adjust(&self, items: Vec<AdjustItem>, actor: Actor) -> Vec<BulkAdjustResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = self.adjust(item.product_id, item.quantity, &item.reason, actor.clone()).await;
            results.push(BulkAdjustResult { product_id: item.product_id, result });
        }
        let failed = results.iter().filter(|r| r.result.is_err()).count();
        tracing::info!(total = results.len(), failed, "bulk adjustment processed");
        results
    }

    /// Deducts every line or none. Availability is checked per product over
    /// the summed quantities, and each line gets its own ledger entry.
    #[tracing::instrument(skip(self, lines, actor), fields(lines = lines.len(), actor = %actor))]
    pub async fn deduct_lines(&self, lines: &[OrderLine], reference: Reference, actor: Actor) -> Result<Vec<StockChange>> {
        let quantities = validate_lines(lines)?;
        let totals = OrderLine::consolidate(lines)?;
        let product_ids: Vec<ProductId> = totals.iter().map(|l| l.product_id).collect();
        let (_, entries) = self.apply(&product_ids, |records| {
            let shortages: Vec<Shortage> = totals.iter()
                .filter_map(|l| {
                    let available = records[&l.product_id].stock;
                    (available < l.quantity).then(|| Shortage { product_id: l.product_id, requested: l.quantity, available })
                })
                .collect();
            if !shortages.is_empty() {
                return Err(InventoryError::InsufficientStock { shortages });
            }
            plan_lines(records, lines, &quantities, |record, q| record.plan_deduct(q, Some(reference.clone()), actor.clone()))
        }).await?;
        Ok(entries.iter().map(StockChange::from).collect())
    }

    /// Adds every line or none, one ledger entry per line.
    #[tracing::instrument(skip(self, lines, actor), fields(lines = lines.len(), actor = %actor))]
    pub async fn add_lines(&self, lines: &[OrderLine], reference: Reference, actor: Actor) -> Result<Vec<StockChange>> {
        let quantities = validate_lines(lines)?;
        let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let (_, entries) = self.apply(&product_ids, |records| {
            plan_lines(records, lines, &quantities, |record, q| record.plan_add(q, Some(reference.clone()), actor.clone()))
        }).await?;
        Ok(entries.iter().map(StockChange::from).collect())
    }

    async fn ensure_exists(&self, product_ids: &[ProductId]) -> Result<()> {
        for &product_id in product_ids {
            if self.store.stock_record(product_id).await?.is_none() {
                return Err(InventoryError::NotFound(product_id));
            }
        }
        Ok(())
    }

    /// The single write path. `plan` sees the records as read under the
    /// locks; whatever it returns is committed as one unit.
    async fn apply<F>(&self, product_ids: &[ProductId], plan: F) -> Result<(HashMap<ProductId, StockRecord>, Vec<LedgerEntry>)>
    where
        F: FnOnce(&HashMap<ProductId, StockRecord>) -> Result<Vec<PlannedMovement>>,
    {
        self.ensure_exists(product_ids).await?;
        let guard = self.locks.acquire_all(product_ids).await?;

        let mut records = HashMap::with_capacity(product_ids.len());
        for &product_id in product_ids {
            let record = self.store.stock_record(product_id).await?.ok_or(InventoryError::NotFound(product_id))?;
            records.insert(product_id, record);
        }

        let movements = match plan(&records) {
            Ok(movements) => movements,
            Err(err) => {
                tracing::warn!(error = %err, "stock movement rejected");
                return Err(err);
            }
        };
        if movements.is_empty() {
            return Ok((records, Vec::new()));
        }

        let entries = match self.store.commit(movements).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, retryable = err.is_retryable(), "stock commit failed, nothing applied");
                return Err(err);
            }
        };
        drop(guard);

        for entry in &entries {
            tracing::info!(
                product_id = %entry.product_id, movement = %entry.movement_type, quantity = entry.quantity,
                before = entry.stock_before, after = entry.stock_after, "stock movement committed"
            );
            self.notify(&records[&entry.product_id], entry).await;
        }
        Ok((records, entries))
    }

    async fn notify(&self, record: &StockRecord, entry: &LedgerEntry) {
        for event in InventoryEvent::for_entry(record, entry) {
            if let Err(err) = self.sink.publish(&event).await {
                tracing::warn!(error = %err, event = event.name(), product_id = %entry.product_id, "failed to publish inventory event");
            }
        }
    }
}

fn validate_lines(lines: &[OrderLine]) -> Result<Vec<Quantity>> {
    if lines.is_empty() {
        return Err(InventoryError::InvalidQuantity("no order lines given".into()));
    }
    lines.iter().map(|l| Quantity::new(l.quantity)).collect()
}

/// Plans one movement per line, chaining lines that share a product.
fn plan_lines<P>(records: &HashMap<ProductId, StockRecord>, lines: &[OrderLine], quantities: &[Quantity], mut plan_one: P) -> Result<Vec<PlannedMovement>>
where
    P: FnMut(&StockRecord, Quantity) -> Result<PlannedMovement>,
{
    let mut running = records.clone();
    let mut movements = Vec::with_capacity(lines.len());
    for (line, &quantity) in lines.iter().zip(quantities) {
        let record = running.get_mut(&line.product_id).ok_or(InventoryError::NotFound(line.product_id))?;
        let movement = plan_one(record, quantity)?;
        record.stock = movement.stock_after;
        movements.push(movement);
    }
    Ok(movements)
}
