//! Inventory services: the write path, order coupling and read models.

mod locks;
mod mutator;
mod notify;
mod order_events;
mod queries;

pub use locks::{ProductGuard, ProductLocks};
pub use mutator::{AdjustItem, BulkAdjustResult, StockChange, StockMutator};
pub use notify::{EventSink, MemorySink, NatsSink, NoopSink};
pub use order_events::{OrderEventHandler, OrderItemsPlaced, OrderStatusChanged, OrderStockOutcome};
pub use queries::{AuditReport, InventoryQueryService, ProductSummary};
