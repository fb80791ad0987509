//! Durability layer for stock records and the movement ledger.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{LedgerEntry, MovementType, PlannedMovement, StockRecord};
use crate::domain::value_objects::{Page, PageRequest, ProductId};
use crate::Result;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StockFilter {
    #[serde(default)]
    pub low_stock_only: bool,
    pub search: Option<String>,
}

impl StockFilter {
    pub fn matches(&self, record: &StockRecord) -> bool {
        if self.low_stock_only && !record.is_low_stock() { return false; }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                record.name.to_lowercase().contains(&needle) || record.sku.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    pub fn for_product(product_id: ProductId) -> Self { Self { product_id: Some(product_id), ..Self::default() } }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.product_id.map_or(true, |p| p == entry.product_id)
            && self.movement_type.map_or(true, |t| t == entry.movement_type)
            && self.from.map_or(true, |from| entry.created_at >= from)
            && self.to.map_or(true, |to| entry.created_at <= to)
    }
}

/// Ledger entry joined with the product name for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovementRow {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub product_name: String,
}

/// Raw aggregates over one product's ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MovementTotals {
    pub total_in: i64,
    pub total_out: i64,
    pub net_adjust: i64,
    pub movement_count: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl MovementTotals {
    pub fn record(&mut self, entry: &LedgerEntry) {
        match entry.movement_type {
            MovementType::In => self.total_in += entry.quantity,
            MovementType::Out => self.total_out += -entry.quantity,
            MovementType::Adjust => self.net_adjust += entry.quantity,
        }
        self.movement_count += 1;
        self.last_movement_at = self.last_movement_at.max(Some(entry.created_at));
    }
}

/// Storage seam behind the mutator and the query service.
///
/// Only [`crate::StockMutator`] calls `commit`, and only while holding the
/// product locks of every movement in the batch.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert_product(&self, record: StockRecord) -> Result<StockRecord>;

    async fn stock_record(&self, product_id: ProductId) -> Result<Option<StockRecord>>;

    async fn set_alert_threshold(&self, product_id: ProductId, threshold: i64) -> Result<StockRecord>;

    /// Applies every counter update and ledger insert of the batch as one
    /// atomic unit. Fails without writing anything if any `stock_before` no
    /// longer matches the stored counter or any `stock_after` is negative.
    async fn commit(&self, movements: Vec<PlannedMovement>) -> Result<Vec<LedgerEntry>>;

    async fn list_stock(&self, filter: &StockFilter, page: PageRequest) -> Result<Page<StockRecord>>;

    /// Active products with `stock <= stock_alert_threshold`, unordered.
    async fn low_stock(&self) -> Result<Vec<StockRecord>>;

    /// Newest first.
    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> Result<Page<MovementRow>>;

    async fn movement_totals(&self, product_id: ProductId) -> Result<MovementTotals>;

    async fn latest_entry(&self, product_id: ProductId) -> Result<Option<LedgerEntry>>;
}
