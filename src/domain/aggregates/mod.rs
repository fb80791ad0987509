//! Aggregates module
pub mod ledger;
pub mod order;
pub mod stock;

pub use ledger::{LedgerEntry, MovementType, Reference, ReferenceType};
pub use order::{OrderLine, OrderStatus, StockEffect};
pub use stock::{NewProduct, PlannedMovement, ProductStatus, StockRecord, DEFAULT_ALERT_THRESHOLD};
