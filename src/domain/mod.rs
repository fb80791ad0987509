//! Inventory domain: stock records, ledger entries, order coupling, events.

pub mod aggregates;
pub mod events;
pub mod value_objects;
