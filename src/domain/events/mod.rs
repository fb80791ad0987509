//! Domain events
use serde::Serialize;
use crate::domain::aggregates::{LedgerEntry, MovementType, StockRecord};
use crate::domain::value_objects::ProductId;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InventoryEvent {
    StockMoved { product_id: ProductId, movement_type: MovementType, stock_before: i64, stock_after: i64 },
    LowStockEntered { product_id: ProductId, name: String, stock: i64, threshold: i64 },
    LowStockCleared { product_id: ProductId, stock: i64, threshold: i64 },
}

impl InventoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StockMoved { .. } => "stock_moved",
            Self::LowStockEntered { .. } => "low_stock_entered",
            Self::LowStockCleared { .. } => "low_stock_cleared",
        }
    }

    /// Events raised by one committed entry against the record it was applied to.
    pub fn for_entry(record: &StockRecord, entry: &LedgerEntry) -> Vec<InventoryEvent> {
        let threshold = record.stock_alert_threshold;
        let mut events = vec![InventoryEvent::StockMoved {
            product_id: entry.product_id, movement_type: entry.movement_type,
            stock_before: entry.stock_before, stock_after: entry.stock_after,
        }];
        let was_low = entry.stock_before <= threshold;
        let is_low = entry.stock_after <= threshold;
        if !was_low && is_low {
            events.push(InventoryEvent::LowStockEntered { product_id: entry.product_id, name: record.name.clone(), stock: entry.stock_after, threshold });
        } else if was_low && !is_low {
            events.push(InventoryEvent::LowStockCleared { product_id: entry.product_id, stock: entry.stock_after, threshold });
        }
        events
    }
}
