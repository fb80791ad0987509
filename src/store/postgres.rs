//! Postgres store. Counter update and ledger insert share one transaction,
//! and each product row is locked with `FOR UPDATE` under a bounded
//! `lock_timeout`, so other processes sharing the database serialize too.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;
use crate::domain::aggregates::{LedgerEntry, PlannedMovement, ReferenceType, StockRecord};
use crate::domain::value_objects::{Page, PageRequest, ProductId};
use crate::store::{InventoryStore, MovementFilter, MovementRow, MovementTotals, StockFilter};
use crate::{InventoryError, Result};

const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid, sku: String, name: String, status: String,
    stock: i64, stock_alert_threshold: i64, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for StockRecord {
    type Error = InventoryError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(StockRecord {
            product_id: ProductId::from_uuid(r.id), sku: r.sku, name: r.name, status: r.status.parse()?,
            stock: r.stock, stock_alert_threshold: r.stock_alert_threshold, updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    product_id: Uuid,
    #[sqlx(rename = "type")]
    movement_type: String,
    quantity: i64,
    stock_before: i64,
    stock_after: i64,
    reference_type: Option<String>,
    reference_id: Option<String>,
    reason: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = InventoryError;
    fn try_from(r: LedgerRow) -> Result<Self> {
        Ok(LedgerEntry {
            id: r.id, product_id: ProductId::from_uuid(r.product_id), movement_type: r.movement_type.parse()?,
            quantity: r.quantity, stock_before: r.stock_before, stock_after: r.stock_after,
            reference_type: r.reference_type.as_deref().map(str::parse::<ReferenceType>).transpose()?,
            reference_id: r.reference_id, reason: r.reason, created_by: r.created_by.parse()?, created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementJoinRow {
    #[sqlx(flatten)]
    entry: LedgerRow,
    product_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    total_in: i64, total_out: i64, net_adjust: i64, movement_count: i64,
    last_movement_at: Option<DateTime<Utc>>,
}

const PRODUCT_COLUMNS: &str = "id, sku, name, status, stock, stock_alert_threshold, updated_at";
const LEDGER_COLUMNS: &str = "l.id, l.product_id, l.type, l.quantity, l.stock_before, l.stock_after, l.reference_type, l.reference_id, l.reason, l.created_by, l.created_at";

/// `seq` is drawn while the product row is locked, so per product it follows
/// counter order even when transactions start in a different order.
const LEDGER_NEWEST_FIRST: &str = " ORDER BY l.seq DESC";

/// Entries carry the time of the insert itself, not of the transaction start.
const INSERT_LEDGER: &str = "INSERT INTO inventory_ledger \
    (id, product_id, type, quantity, stock_before, stock_after, reference_type, reference_id, reason, created_by, created_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, clock_timestamp()) RETURNING created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self { Self { pool, lock_timeout } }

    fn lock_error(&self, product_id: ProductId, err: sqlx::Error) -> InventoryError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(PG_LOCK_NOT_AVAILABLE) {
                return InventoryError::LockTimeout { product_id, waited_ms: self.lock_timeout.as_millis() as u64 };
            }
        }
        err.into()
    }
}

fn push_stock_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &StockFilter) {
    qb.push(" WHERE TRUE");
    if filter.low_stock_only {
        qb.push(" AND stock <= stock_alert_threshold");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(" AND (name ILIKE ").push_bind(pattern.clone()).push(" OR sku ILIKE ").push_bind(pattern).push(")");
    }
}

fn push_movement_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
    qb.push(" WHERE TRUE");
    if let Some(product_id) = filter.product_id {
        qb.push(" AND l.product_id = ").push_bind(product_id.as_uuid());
    }
    if let Some(t) = filter.movement_type {
        qb.push(" AND l.type = ").push_bind(t.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND l.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND l.created_at <= ").push_bind(to);
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn insert_product(&self, record: StockRecord) -> Result<StockRecord> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products (id, sku, name, status, stock, stock_alert_threshold, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 0, $5, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(record.product_id.as_uuid()).bind(&record.sku).bind(&record.name).bind(record.status.as_str()).bind(record.stock_alert_threshold)
        .fetch_one(&self.pool).await?;
        row.try_into()
    }

    async fn stock_record(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool).await?
            .map(StockRecord::try_from).transpose()
    }

    async fn set_alert_threshold(&self, product_id: ProductId, threshold: i64) -> Result<StockRecord> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET stock_alert_threshold = $2, updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product_id.as_uuid()).bind(threshold)
        .fetch_optional(&self.pool).await?
        .ok_or(InventoryError::NotFound(product_id))?
        .try_into()
    }

    async fn commit(&self, movements: Vec<PlannedMovement>) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.pool.begin().await?;
        // SET does not accept bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis()))
            .execute(&mut *tx).await?;

        let mut entries = Vec::with_capacity(movements.len());
        for m in movements {
            let current: Option<(i64,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(m.product_id.as_uuid())
                .fetch_optional(&mut *tx).await
                .map_err(|e| self.lock_error(m.product_id, e))?;
            let (stock,) = current.ok_or(InventoryError::NotFound(m.product_id))?;
            if stock != m.stock_before {
                return Err(InventoryError::Storage(format!(
                    "stale movement for product {}: expected stock {}, found {stock}", m.product_id, m.stock_before
                )));
            }

            sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
                .bind(m.product_id.as_uuid()).bind(m.stock_after)
                .execute(&mut *tx).await?;

            let entry = m.into_entry(Utc::now());
            let created_at: (DateTime<Utc>,) = sqlx::query_as(INSERT_LEDGER)
            .bind(entry.id).bind(entry.product_id.as_uuid()).bind(entry.movement_type.as_str())
            .bind(entry.quantity).bind(entry.stock_before).bind(entry.stock_after)
            .bind(entry.reference_type.map(|t| t.as_str())).bind(&entry.reference_id).bind(&entry.reason)
            .bind(entry.created_by.to_string())
            .fetch_one(&mut *tx).await?;
            entries.push(LedgerEntry { created_at: created_at.0, ..entry });
        }

        tx.commit().await?;
        Ok(entries)
    }

    async fn list_stock(&self, filter: &StockFilter, page: PageRequest) -> Result<Page<StockRecord>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_stock_filter(&mut qb, filter);
        qb.push(" ORDER BY name, id LIMIT ").push_bind(page.limit() as i64).push(" OFFSET ").push_bind(page.offset() as i64);
        let rows = qb.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_stock_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let data = rows.into_iter().map(StockRecord::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page { data, total, page: page.page })
    }

    async fn low_stock(&self) -> Result<Vec<StockRecord>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = 'active' AND stock <= stock_alert_threshold"
        ))
        .fetch_all(&self.pool).await?
        .into_iter().map(StockRecord::try_from).collect()
    }

    async fn list_movements(&self, filter: &MovementFilter, page: PageRequest) -> Result<Page<MovementRow>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LEDGER_COLUMNS}, p.name AS product_name FROM inventory_ledger l JOIN products p ON p.id = l.product_id"
        ));
        push_movement_filter(&mut qb, filter);
        qb.push(LEDGER_NEWEST_FIRST).push(" LIMIT ").push_bind(page.limit() as i64).push(" OFFSET ").push_bind(page.offset() as i64);
        let rows = qb.build_query_as::<MovementJoinRow>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM inventory_ledger l");
        push_movement_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let data = rows.into_iter()
            .map(|r| Ok(MovementRow { entry: r.entry.try_into()?, product_name: r.product_name }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page { data, total, page: page.page })
    }

    async fn movement_totals(&self, product_id: ProductId) -> Result<MovementTotals> {
        let row = sqlx::query_as::<_, TotalsRow>(
            "SELECT \
               COALESCE(SUM(quantity) FILTER (WHERE type = 'in'), 0)::BIGINT AS total_in, \
               COALESCE(-SUM(quantity) FILTER (WHERE type = 'out'), 0)::BIGINT AS total_out, \
               COALESCE(SUM(quantity) FILTER (WHERE type = 'adjust'), 0)::BIGINT AS net_adjust, \
               COUNT(*) AS movement_count, \
               MAX(created_at) AS last_movement_at \
             FROM inventory_ledger WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_one(&self.pool).await?;
        Ok(MovementTotals {
            total_in: row.total_in, total_out: row.total_out, net_adjust: row.net_adjust,
            movement_count: row.movement_count, last_movement_at: row.last_movement_at,
        })
    }

    async fn latest_entry(&self, product_id: ProductId) -> Result<Option<LedgerEntry>> {
        sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory_ledger l WHERE l.product_id = $1{LEDGER_NEWEST_FIRST} LIMIT 1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool).await?
        .map(LedgerEntry::try_from).transpose()
    }
}
