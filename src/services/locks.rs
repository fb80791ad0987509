//! Per-product exclusive locks with a bounded wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use crate::domain::value_objects::ProductId;
use crate::{InventoryError, Result};

/// Idle locks are dropped from the registry once it grows past this size.
const PRUNE_THRESHOLD: usize = 4096;

/// Lazily creates one async mutex per product and hands out the same one for
/// repeated lookups.
pub struct ProductLocks {
    locks: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

/// Held product locks; released on drop.
#[derive(Debug)]
pub struct ProductGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ProductLocks {
    pub fn new(timeout: Duration) -> Self {
        Self { locks: Mutex::new(HashMap::new()), timeout }
    }

    fn lock_for(&self, product_id: ProductId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| InventoryError::Storage("lock registry poisoned".into()))?;
        if locks.len() > PRUNE_THRESHOLD {
            // Only the registry holds an idle lock, so nobody can be waiting on it.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(locks.entry(product_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone())
    }

    /// Acquires every product's lock in ascending id order, so two callers
    /// locking overlapping sets cannot deadlock. The timeout bounds the whole
    /// acquisition, not each lock.
    pub async fn acquire_all(&self, product_ids: &[ProductId]) -> Result<ProductGuard> {
        let mut ids = product_ids.to_vec();
        ids.sort();
        ids.dedup();

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut guards = Vec::with_capacity(ids.len());
        for product_id in ids {
            let lock = self.lock_for(product_id)?;
            match tokio::time::timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(%product_id, waited_ms, held = guards.len(), "stock lock wait timed out");
                    return Err(InventoryError::LockTimeout { product_id, waited_ms });
                }
            }
        }
        Ok(ProductGuard { _guards: guards })
    }

    pub async fn acquire(&self, product_id: ProductId) -> Result<ProductGuard> {
        self.acquire_all(&[product_id]).await
    }
}
