//! Value Objects for Inventory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::InventoryError;

/// Identity of a catalog product whose stock is tracked here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    pub fn new() -> Self { Self(Uuid::now_v7()) }
    pub fn from_uuid(id: Uuid) -> Self { Self(id) }
    pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl Default for ProductId { fn default() -> Self { Self::new() } }

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for ProductId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
}

/// Identity of an order in the (external) order subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Strictly positive movement size used by deduct and add.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, InventoryError> {
        if value <= 0 {
            return Err(InventoryError::InvalidQuantity(format!("quantity must be positive, got {value}")));
        }
        Ok(Self(value))
    }
    pub fn value(&self) -> i64 { self.0 }
}

/// Who caused a movement. Order triggers run as `System`; manual
/// corrections carry the authenticated admin's identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Actor {
    System,
    Admin(String),
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self { Self::Admin(id.into()) }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = InventoryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            other => other
                .strip_prefix("admin:")
                .filter(|id| !id.is_empty())
                .map(|id| Self::Admin(id.to_string()))
                .ok_or_else(|| InventoryError::Storage(format!("unrecognised actor '{other}'"))),
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based page request, clamped the same way for every listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest { pub page: u32, pub per_page: u32 }

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }
    pub fn offset(&self) -> usize {
        let offset = u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page);
        usize::try_from(offset).unwrap_or(usize::MAX)
    }
    pub fn limit(&self) -> usize { self.per_page as usize }
}

impl Default for PageRequest { fn default() -> Self { Self::new(None, None) } }

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

impl<T> Page<T> {
    /// Slices an already filtered and ordered result set.
    pub fn from_rows(rows: Vec<T>, request: PageRequest) -> Self {
        let total = rows.len() as i64;
        let data = rows.into_iter().skip(request.offset()).take(request.limit()).collect();
        Self { data, total, page: request.page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero_and_negative() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert_eq!(Quantity::new(4).unwrap().value(), 4);
    }

    #[test]
    fn test_actor_text_form() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!("admin:ops-7".parse::<Actor>().unwrap(), Actor::admin("ops-7"));
        assert!("admin:".parse::<Actor>().is_err());
    }

    #[test]
    fn test_page_request_clamps() {
        let p = PageRequest::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);
        let page = Page::from_rows((0..45).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(20)));
        assert_eq!(page.data, (40..45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
    }

    #[test]
    fn test_huge_page_number_is_just_empty() {
        let request = PageRequest::new(Some(u32::MAX), Some(MAX_PER_PAGE));
        assert_eq!(request.offset(), (u32::MAX as usize - 1) * MAX_PER_PAGE as usize);
        let page = Page::from_rows(vec![1, 2, 3], request);
        assert!(page.data.is_empty());
        assert_eq!(page.total, 3);
    }
}
