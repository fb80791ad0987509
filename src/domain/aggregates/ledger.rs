//! Ledger Entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::value_objects::{Actor, OrderId, ProductId};
use crate::InventoryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType { In, Out, Adjust }

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::In => "in", Self::Out => "out", Self::Adjust => "adjust" }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for MovementType {
    type Err = InventoryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjust" => Ok(Self::Adjust),
            other => Err(InventoryError::Storage(format!("unknown movement type '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType { Order, OrderCancel, Manual }

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Order => "order", Self::OrderCancel => "order_cancel", Self::Manual => "manual" }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ReferenceType {
    type Err = InventoryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "order_cancel" => Ok(Self::OrderCancel),
            "manual" => Ok(Self::Manual),
            other => Err(InventoryError::Storage(format!("unknown reference type '{other}'"))),
        }
    }
}

/// Back-pointer to the event that caused a movement. Lookup only, never ownership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference { pub kind: ReferenceType, pub id: Option<String> }

impl Reference {
    pub fn order(order_id: &OrderId) -> Self { Self { kind: ReferenceType::Order, id: Some(order_id.to_string()) } }
    pub fn order_cancel(order_id: &OrderId) -> Self { Self { kind: ReferenceType::OrderCancel, id: Some(order_id.to_string()) } }
    pub fn manual() -> Self { Self { kind: ReferenceType::Manual, id: None } }
}

/// One immutable stock movement. `quantity` is the signed change applied to
/// the counter, so `stock_before + quantity == stock_after` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub reason: Option<String>,
    pub created_by: Actor,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn reference(&self) -> Option<Reference> {
        self.reference_type.map(|kind| Reference { kind, id: self.reference_id.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_closed() {
        for t in [MovementType::In, MovementType::Out, MovementType::Adjust] {
            assert_eq!(t.as_str().parse::<MovementType>().unwrap(), t);
        }
        assert!("transfer".parse::<MovementType>().is_err());
        assert_eq!("order_cancel".parse::<ReferenceType>().unwrap(), ReferenceType::OrderCancel);
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = LedgerEntry {
            id: Uuid::now_v7(), product_id: ProductId::new(), movement_type: MovementType::Out,
            quantity: -3, stock_before: 10, stock_after: 7,
            reference_type: Some(ReferenceType::Order), reference_id: Some("O1".into()),
            reason: None, created_by: Actor::System, created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "out");
        assert_eq!(json["created_by"], "system");
        assert_eq!(entry.reference(), Some(Reference::order(&OrderId::new("O1"))));
    }
}
