//! Inventory Query Service
//!
//! Read-only. Never takes the product locks, so under heavy write
//! contention a listing can trail the newest movement slightly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use crate::domain::aggregates::StockRecord;
use crate::domain::value_objects::{Page, PageRequest, ProductId};
use crate::store::{InventoryStore, MovementFilter, MovementRow, StockFilter};
use crate::{InventoryError, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub current_stock: i64,
    pub stock_alert_threshold: i64,
    pub low_stock: bool,
    pub total_in: i64,
    pub total_out: i64,
    pub net_adjust: i64,
    pub movement_count: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub product_id: ProductId,
    pub stock: i64,
    pub ledger_stock_after: Option<i64>,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct InventoryQueryService {
    store: Arc<dyn InventoryStore>,
}

impl InventoryQueryService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self { Self { store } }

    pub async fn list_inventory(&self, filter: &StockFilter, page: PageRequest) -> Result<Page<StockRecord>> {
        self.store.list_stock(filter, page).await
    }

    /// Active products at or below their threshold, most critical first.
    pub async fn low_stock_alerts(&self) -> Result<Vec<StockRecord>> {
        let mut rows = self.store.low_stock().await?;
        rows.sort_by(|a, b| {
            a.urgency().total_cmp(&b.urgency())
                .then(a.stock.cmp(&b.stock))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rows)
    }

    pub async fn movement_log(&self, filter: &MovementFilter, page: PageRequest) -> Result<Page<MovementRow>> {
        self.store.list_movements(filter, page).await
    }

    /// Zero totals for a product that has never moved; `NotFound` only when
    /// the product has no stock record at all.
    pub async fn product_summary(&self, product_id: ProductId) -> Result<ProductSummary> {
        let record = self.store.stock_record(product_id).await?.ok_or(InventoryError::NotFound(product_id))?;
        let totals = self.store.movement_totals(product_id).await?;
        Ok(ProductSummary {
            product_id,
            name: record.name.clone(),
            current_stock: record.stock,
            stock_alert_threshold: record.stock_alert_threshold,
            low_stock: record.is_low_stock(),
            total_in: totals.total_in,
            total_out: totals.total_out,
            net_adjust: totals.net_adjust,
            movement_count: totals.movement_count,
            last_movement_at: totals.last_movement_at,
        })
    }

    /// Checks the counter against the latest ledger entry. A product with no
    /// history is consistent only while it is still at zero.
    pub async fn audit_product(&self, product_id: ProductId) -> Result<AuditReport> {
        let record = self.store.stock_record(product_id).await?.ok_or(InventoryError::NotFound(product_id))?;
        let ledger_stock_after = self.store.latest_entry(product_id).await?.map(|e| e.stock_after);
        let consistent = ledger_stock_after.unwrap_or(0) == record.stock;
        if !consistent {
            tracing::error!(%product_id, stock = record.stock, ?ledger_stock_after, "stock counter disagrees with ledger");
        }
        Ok(AuditReport { product_id, stock: record.stock, ledger_stock_after, consistent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewProduct, ProductStatus, Reference};
    use crate::domain::value_objects::Actor;
    use crate::services::mutator::StockMutator;
    use crate::services::notify::NoopSink;
    use crate::store::MemoryStore;
    use std::time::Duration;

    async fn setup() -> (StockMutator, InventoryQueryService) {
        let store: Arc<dyn InventoryStore> = Arc::new(MemoryStore::new());
        let mutator = StockMutator::new(store.clone(), Arc::new(NoopSink), Duration::from_millis(200), 5);
        (mutator, InventoryQueryService::new(store))
    }

    async fn product(m: &StockMutator, name: &str, status: ProductStatus, threshold: i64, stock: i64) -> ProductId {
        let product_id = ProductId::new();
        m.register_product(NewProduct {
            product_id, sku: name.to_uppercase(), name: name.into(), status, stock_alert_threshold: Some(threshold),
        }).await.unwrap();
        if stock > 0 {
            m.add(product_id, stock, Reference::manual(), Actor::admin("seed")).await.unwrap();
        }
        product_id
    }

    #[tokio::test]
    async fn test_alerts_ordered_by_urgency() {
        let (m, q) = setup().await;
        let half = product(&m, "half", ProductStatus::Active, 10, 5).await;
        let empty = product(&m, "empty", ProductStatus::Active, 3, 0).await;
        let fifth = product(&m, "fifth", ProductStatus::Active, 10, 2).await;
        product(&m, "plenty", ProductStatus::Active, 5, 50).await;
        product(&m, "archived", ProductStatus::Archived, 5, 0).await;

        let ids: Vec<ProductId> = q.low_stock_alerts().await.unwrap().iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![empty, fifth, half]);
    }

    #[tokio::test]
    async fn test_alerts_empty_is_not_an_error() {
        let (m, q) = setup().await;
        product(&m, "plenty", ProductStatus::Active, 5, 50).await;
        assert!(q.low_stock_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_inventory_filters() {
        let (m, q) = setup().await;
        product(&m, "Blue Mug", ProductStatus::Active, 5, 2).await;
        product(&m, "Red Mug", ProductStatus::Active, 5, 20).await;
        product(&m, "Teapot", ProductStatus::Active, 5, 1).await;

        let low = q.list_inventory(&StockFilter { low_stock_only: true, search: None }, PageRequest::default()).await.unwrap();
        assert_eq!(low.total, 2);
        let mugs = q.list_inventory(&StockFilter { low_stock_only: false, search: Some("mug".into()) }, PageRequest::default()).await.unwrap();
        assert_eq!(mugs.data.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["Blue Mug", "Red Mug"]);
        let page = q.list_inventory(&StockFilter::default(), PageRequest::new(Some(2), Some(2))).await.unwrap();
        assert_eq!((page.total, page.data.len()), (3, 1));
    }

    #[tokio::test]
    async fn test_summary_for_untouched_product_is_zero() {
        let (m, q) = setup().await;
        let p = product(&m, "new", ProductStatus::Active, 5, 0).await;
        let s = q.product_summary(p).await.unwrap();
        assert_eq!((s.total_in, s.total_out, s.net_adjust, s.movement_count), (0, 0, 0, 0));
        assert_eq!(s.last_movement_at, None);
        assert!(matches!(q.product_summary(ProductId::new()).await, Err(InventoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_summary_totals() {
        let (m, q) = setup().await;
        let p = product(&m, "mixed", ProductStatus::Active, 5, 10).await;
        m.deduct(p, 4, Reference::manual(), Actor::System).await.unwrap();
        m.adjust(p, 3, "shrinkage", Actor::admin("ops")).await.unwrap();
        let s = q.product_summary(p).await.unwrap();
        assert_eq!((s.total_in, s.total_out, s.net_adjust, s.movement_count), (10, 4, -3, 3));
        assert_eq!(s.current_stock, 3);
        assert!(s.last_movement_at.is_some());
        assert!(q.audit_product(p).await.unwrap().consistent);
    }
}
