//! In-process store. Backs the service when no `DATABASE_URL` is set, and
//! every test.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::domain::aggregates::{LedgerEntry, PlannedMovement, StockRecord};
use crate::domain::value_objects::{Page, PageRequest, ProductId};
use crate::store::{InventoryStore, MovementFilter, MovementRow, MovementTotals, StockFilter};
use crate::{InventoryError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, StockRecord>,
    /// Append-only; insertion order is creation order.
    ledger: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Makes the next `commit` fail as if the durability layer rejected it.
    pub fn fail_next_commit(&self) { self.fail_next_commit.store(true, Ordering::SeqCst); }

    pub fn ledger_len(&self) -> usize { self.read().map(|s| s.ledger.len()).unwrap_or(0) }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| InventoryError::Storage("memory store poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| InventoryError::Storage("memory store poisoned".into()))
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_product(&self, record: StockRecord) -> Result<StockRecord> {
        let mut state = self.write()?;
        if state.products.contains_key(&record.product_id) {
            return Err(InventoryError::Storage(format!("product {} is already registered", record.product_id)));
        }
        state.products.insert(record.product_id, record.clone());
        Ok(record)
    }

    async fn stock_record(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        Ok(self.read()?.products.get(&product_id).cloned())
    }

    async fn set_alert_threshold(&self, product_id: ProductId, threshold: i64) -> Result<StockRecord> {
        let mut state = self.write()?;
        let record = state.products.get_mut(&product_id).ok_or(InventoryError::NotFound(product_id))?;
        record.stock_alert_threshold = threshold;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn commit(&self, movements: Vec<PlannedMovement>) -> Result<Vec<LedgerEntry>> {
        let mut state = self.write()?;
        // Movements for the same product chain: each starts where the previous one ended.
        let mut running: HashMap<ProductId, i64> = HashMap::new();
        for m in &movements {
            let current = match running.get(&m.product_id) {
                Some(stock) => *stock,
                None => state.products.get(&m.product_id).ok_or(InventoryError::NotFound(m.product_id))?.stock,
            };
            if current != m.stock_before {
                return Err(InventoryError::Storage(format!(
                    "stale movement for product {}: expected stock {}, found {current}", m.product_id, m.stock_before
                )));
            }
            if m.stock_after < 0 {
                return Err(InventoryError::Storage(format!("stock for product {} cannot go negative", m.product_id)));
            }
            running.insert(m.product_id, m.stock_after);
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(InventoryError::Storage("injected commit failure".into()));
        }

        let now = Utc::now();
        let mut entries = Vec::with_capacity(movements.len());
        for m in movements {
            if let Some(record) = state.products.get_mut(&m.product_id) {
                record.stock = m.stock_after;
                record.updated_at = now;
            }
            let entry = m.into_entry(now);
            state.ledger.push(entry.clone());
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn list_stock(&self, filter: &StockFilter, page: PageRequest) -> Result<Page<StockRecord>> {
        let state = self.read()?;
        let mut rows: Vec<StockRecord> = state.products.values().filter(|r| filter.matches(r)).cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        Ok(Page::from_rows(rows, page))
    }

    async fn low_stock(&self) -> Result<Vec<StockRecord>> {
        let state = self.read()?;
        Ok(state.products.values().filter(|r| r.is_active() && r.is_low_stock()).cloned().collect())
    }

    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> Result<Page<MovementRow>> {
        let state = self.read()?;
        let rows = state.ledger.iter().rev()
            .filter(|e| filter.matches(e))
            .map(|e| MovementRow {
                entry: e.clone(),
                product_name: state.products.get(&e.product_id).map(|p| p.name.clone()).unwrap_or_default(),
            })
            .collect();
        Ok(Page::from_rows(rows, page))
    }

    async fn movement_totals(&self, product_id: ProductId) -> Result<MovementTotals> {
        let state = self.read()?;
        let mut totals = MovementTotals::default();
        for entry in state.ledger.iter().filter(|e| e.product_id == product_id) {
            totals.record(entry);
        }
        Ok(totals)
    }

    async fn latest_entry(&self, product_id: ProductId) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.ledger.iter().rev().find(|e| e.product_id == product_id).cloned())
    }
}
