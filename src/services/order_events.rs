//! Order Event Handler
//!
//! Bridges order lifecycle transitions into stock movements using the
//! transition table on [`OrderStatus::stock_effect`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::domain::aggregates::{OrderLine, OrderStatus, Reference, StockEffect};
use crate::domain::value_objects::{Actor, OrderId};
use crate::services::mutator::{StockChange, StockMutator};
use crate::Result;

/// Order items proposed for an order that is created in `status`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItemsPlaced {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub items: Vec<OrderLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "changes", rename_all = "snake_case")]
pub enum OrderStockOutcome {
    Deducted(Vec<StockChange>),
    Restored(Vec<StockChange>),
    Unchanged,
}

#[derive(Clone)]
pub struct OrderEventHandler {
    mutator: Arc<StockMutator>,
}

impl OrderEventHandler {
    pub fn new(mutator: Arc<StockMutator>) -> Self { Self { mutator } }

    /// Gatekeeper for item creation. For a paid order either every item is
    /// deducted or the whole batch is rejected with the shortages listed.
    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id, status = ?event.status))]
    pub async fn on_items_placed(&self, event: &OrderItemsPlaced) -> Result<OrderStockOutcome> {
        self.reconcile(&event.order_id, OrderStatus::stock_effect(None, event.status), &event.items).await
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id, from = ?event.from, to = ?event.to))]
    pub async fn on_status_changed(&self, event: &OrderStatusChanged) -> Result<OrderStockOutcome> {
        self.reconcile(&event.order_id, OrderStatus::stock_effect(Some(event.from), event.to), &event.items).await
    }

    async fn reconcile(&self, order_id: &OrderId, effect: StockEffect, items: &[OrderLine]) -> Result<OrderStockOutcome> {
        match effect {
            StockEffect::Deduct => {
                let changes = self.mutator.deduct_lines(items, Reference::order(order_id), Actor::System).await?;
                tracing::info!(items = changes.len(), "order stock deducted");
                Ok(OrderStockOutcome::Deducted(changes))
            }
            StockEffect::Restore => {
                let changes = self.mutator.add_lines(items, Reference::order_cancel(order_id), Actor::System).await?;
                tracing::info!(items = changes.len(), "order stock restored");
                Ok(OrderStockOutcome::Restored(changes))
            }
            StockEffect::Unchanged => {
                tracing::debug!("order transition does not move stock");
                Ok(OrderStockOutcome::Unchanged)
            }
        }
    }
}
