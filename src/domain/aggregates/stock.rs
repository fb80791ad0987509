//! Product Stock Record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::ledger::{LedgerEntry, MovementType, Reference};
use crate::domain::value_objects::{Actor, ProductId, Quantity};
use crate::{InventoryError, Result};

pub const DEFAULT_ALERT_THRESHOLD: i64 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
}

impl FromStr for ProductStatus {
    type Err = InventoryError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(InventoryError::Storage(format!("unknown product status '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub status: ProductStatus,
    pub stock: i64,
    pub stock_alert_threshold: i64,
    pub updated_at: DateTime<Utc>,
}

/// Registration payload: the stock record is created alongside the catalog
/// product and always starts at zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub status: ProductStatus,
    pub stock_alert_threshold: Option<i64>,
}

impl NewProduct {
    pub fn into_record(self, default_threshold: i64) -> Result<StockRecord> {
        let threshold = self.stock_alert_threshold.unwrap_or(default_threshold);
        validate_threshold(threshold)?;
        Ok(StockRecord {
            product_id: self.product_id, sku: self.sku, name: self.name, status: self.status,
            stock: 0, stock_alert_threshold: threshold, updated_at: Utc::now(),
        })
    }
}

pub fn validate_threshold(threshold: i64) -> Result<()> {
    if threshold < 0 {
        return Err(InventoryError::InvalidQuantity(format!("alert threshold must be non-negative, got {threshold}")));
    }
    Ok(())
}

/// Checks an adjustment before any lock is taken and returns the trimmed reason.
pub fn validate_adjustment(target: i64, reason: &str) -> Result<String> {
    if target < 0 {
        return Err(InventoryError::InvalidQuantity(format!("adjusted stock must be non-negative, got {target}")));
    }
    let reason = reason.trim();
    if reason.is_empty() { return Err(InventoryError::MissingReason); }
    Ok(reason.to_string())
}

impl StockRecord {
    pub fn is_low_stock(&self) -> bool { self.stock <= self.stock_alert_threshold }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    /// Fraction of the alert threshold still on hand; lower is more urgent.
    /// A zero threshold only alerts at zero stock, which ranks as fully depleted.
    pub fn urgency(&self) -> f64 {
        if self.stock_alert_threshold == 0 { return 0.0; }
        self.stock as f64 / self.stock_alert_threshold as f64
    }

    pub fn plan_deduct(&self, quantity: Quantity, reference: Option<Reference>, actor: Actor) -> Result<PlannedMovement> {
        if self.stock < quantity.value() {
            return Err(InventoryError::insufficient(self.product_id, quantity.value(), self.stock));
        }
        Ok(self.movement(MovementType::Out, self.stock - quantity.value(), reference, None, actor))
    }

    pub fn plan_add(&self, quantity: Quantity, reference: Option<Reference>, actor: Actor) -> Result<PlannedMovement> {
        let after = self.stock.checked_add(quantity.value())
            .ok_or_else(|| InventoryError::InvalidQuantity(format!("adding {} would overflow stock", quantity.value())))?;
        Ok(self.movement(MovementType::In, after, reference, None, actor))
    }

    /// `None` when the target already equals the counter: a zero movement is never written.
    pub fn plan_adjust(&self, target: i64, reason: String, actor: Actor) -> Option<PlannedMovement> {
        if target == self.stock { return None; }
        Some(self.movement(MovementType::Adjust, target, Some(Reference::manual()), Some(reason), actor))
    }

    fn movement(&self, movement_type: MovementType, after: i64, reference: Option<Reference>, reason: Option<String>, actor: Actor) -> PlannedMovement {
        PlannedMovement {
            product_id: self.product_id, movement_type,
            quantity: after - self.stock, stock_before: self.stock, stock_after: after,
            reference, reason, created_by: actor,
        }
    }
}

/// A validated movement waiting to be committed. Stores re-check
/// `stock_before` against the live counter before applying it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedMovement {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference: Option<Reference>,
    pub reason: Option<String>,
    pub created_by: Actor,
}

impl PlannedMovement {
    pub fn into_entry(self, created_at: DateTime<Utc>) -> LedgerEntry {
        let (reference_type, reference_id) = match self.reference {
            Some(r) => (Some(r.kind), r.id),
            None => (None, None),
        };
        LedgerEntry {
            id: Uuid::now_v7(), product_id: self.product_id, movement_type: self.movement_type,
            quantity: self.quantity, stock_before: self.stock_before, stock_after: self.stock_after,
            reference_type, reference_id, reason: self.reason, created_by: self.created_by, created_at,
        }
    }
}
