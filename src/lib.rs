//! OpenSASE Inventory
//!
//! Stock control engine for the OpenSASE storefront.
//!
//! ## Features
//! - Per-product stock counters that never go negative
//! - Append-only movement ledger with before/after snapshots
//! - Order lifecycle coupling (deduct on paid, restore on cancel/refund)
//! - Low-stock alerts, movement history and per-product summaries
//!
//! Every change to a stock counter goes through [`StockMutator`], which holds
//! an exclusive per-product lock while it reads, validates, updates the
//! counter and appends the ledger entry as one atomic commit.

pub mod config;
pub mod domain;
pub mod http;
pub mod services;
pub mod store;

use serde::Serialize;
use thiserror::Error;

pub use domain::aggregates::{
    LedgerEntry, MovementType, NewProduct, OrderLine, OrderStatus, PlannedMovement, ProductStatus,
    Reference, ReferenceType, StockEffect, StockRecord,
};
pub use domain::events::InventoryEvent;
pub use domain::value_objects::{Actor, OrderId, Page, PageRequest, ProductId, Quantity};
pub use services::{
    AdjustItem, AuditReport, BulkAdjustResult, EventSink, InventoryQueryService, MemorySink,
    NatsSink, NoopSink, OrderEventHandler, OrderStockOutcome, ProductLocks, ProductSummary, StockChange,
    StockMutator,
};
pub use store::{InventoryStore, MemoryStore, MovementFilter, MovementRow, PgStore, StockFilter};

// =============================================================================
// Error Types
// =============================================================================

/// A single product that could not cover a requested deduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Insufficient stock: {}", describe_shortages(.shortages))]
    InsufficientStock { shortages: Vec<Shortage> },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("A reason is required for manual adjustments")]
    MissingReason,

    #[error("Timed out after {waited_ms}ms waiting for the stock lock on product {product_id}")]
    LockTimeout { product_id: ProductId, waited_ms: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Product {0} has no stock record")]
    NotFound(ProductId),
}

impl InventoryError {
    pub fn insufficient(product_id: ProductId, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            shortages: vec![Shortage { product_id, requested, available }],
        }
    }

    /// Lock and storage failures leave no partial state behind, so the caller
    /// may retry them with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Storage(_))
    }
}

fn describe_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(|s| format!("product {} requested {}, available {}", s.product_id, s.requested, s.available))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
