//! Order coupling
//!
//! The order aggregate lives in the order subsystem. Inventory only needs the
//! lifecycle states that move stock and the lines of the order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::domain::value_objects::ProductId;
use crate::{InventoryError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Paid, Completed, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockEffect { Deduct, Restore, Unchanged }

impl OrderStatus {
    /// Transition table for stock:
    ///
    /// | from            | to                    | effect  |
    /// |-----------------|-----------------------|---------|
    /// | anything else   | `paid`                | deduct  |
    /// | `paid`          | `cancelled`/`refunded`| restore |
    /// | everything else |                       | none    |
    ///
    /// `from = None` is an order whose items are being created in `to`.
    pub fn stock_effect(from: Option<OrderStatus>, to: OrderStatus) -> StockEffect {
        match (from, to) {
            (Some(Self::Paid), Self::Paid) => StockEffect::Unchanged,
            (_, Self::Paid) => StockEffect::Deduct,
            (Some(Self::Paid), Self::Cancelled | Self::Refunded) => StockEffect::Restore,
            _ => StockEffect::Unchanged,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine { pub product_id: ProductId, pub quantity: i64 }

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: i64) -> Self { Self { product_id, quantity } }

    /// Sums lines per product, ordered by product id so locks are always
    /// taken in the same order.
    pub fn consolidate(lines: &[OrderLine]) -> Result<Vec<OrderLine>> {
        let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
        for line in lines {
            let total = totals.entry(line.product_id).or_default();
            *total = total.checked_add(line.quantity).ok_or_else(|| {
                InventoryError::InvalidQuantity(format!("combined quantity for product {} is too large", line.product_id))
            })?;
        }
        Ok(totals.into_iter().map(|(product_id, quantity)| OrderLine { product_id, quantity }).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(OrderStatus::stock_effect(None, Paid), StockEffect::Deduct);
        assert_eq!(OrderStatus::stock_effect(None, Pending), StockEffect::Unchanged);
        assert_eq!(OrderStatus::stock_effect(Some(Pending), Paid), StockEffect::Deduct);
        assert_eq!(OrderStatus::stock_effect(Some(Paid), Paid), StockEffect::Unchanged);
        assert_eq!(OrderStatus::stock_effect(Some(Paid), Cancelled), StockEffect::Restore);
        assert_eq!(OrderStatus::stock_effect(Some(Paid), Refunded), StockEffect::Restore);
        assert_eq!(OrderStatus::stock_effect(Some(Paid), Completed), StockEffect::Unchanged);
        assert_eq!(OrderStatus::stock_effect(Some(Pending), Cancelled), StockEffect::Unchanged);
        assert_eq!(OrderStatus::stock_effect(Some(Cancelled), Cancelled), StockEffect::Unchanged);
        assert_eq!(OrderStatus::stock_effect(Some(Completed), Refunded), StockEffect::Unchanged);
    }

    #[test]
    fn test_consolidate_merges_and_orders() {
        let a = ProductId::new();
        let b = ProductId::new();
        let merged = OrderLine::consolidate(&[OrderLine::new(b, 1), OrderLine::new(a, 2), OrderLine::new(b, 3)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[0].product_id < merged[1].product_id);
        assert_eq!(merged.iter().find(|l| l.product_id == b).unwrap().quantity, 4);
    }

    #[test]
    fn test_consolidate_rejects_overflowing_total() {
        let p = ProductId::new();
        let err = OrderLine::consolidate(&[OrderLine::new(p, i64::MAX), OrderLine::new(p, 1)]).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuantity(_)));
    }
}
