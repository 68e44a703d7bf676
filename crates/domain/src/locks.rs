//! Per-basket mutual exclusion.
//!
//! Mutations of one basket run one at a time; different baskets never wait
//! on each other. Entries are created on first use and dropped by the last
//! guard to release them, so the table only holds baskets with work in
//! flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::BasketId;
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Table of per-basket async locks.
#[derive(Clone, Default)]
pub struct BasketLocks {
    table: Arc<Mutex<HashMap<BasketId, Slot>>>,
}

impl BasketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to one basket.
    pub async fn acquire(&self, basket_id: &BasketId) -> BasketGuard {
        let slot = {
            let mut table = self.lock_table();
            Arc::clone(table.entry(basket_id.clone()).or_default())
        };

        let guard = slot.lock_owned().await;
        BasketGuard {
            guard: Some(guard),
            basket_id: basket_id.clone(),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of baskets currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock_table().len()
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<BasketId, Slot>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to one basket, released on drop.
pub struct BasketGuard {
    guard: Option<OwnedMutexGuard<()>>,
    basket_id: BasketId,
    table: Arc<Mutex<HashMap<BasketId, Slot>>>,
}

impl BasketGuard {
    pub fn basket_id(&self) -> &BasketId {
        &self.basket_id
    }
}

impl Drop for BasketGuard {
    fn drop(&mut self) {
        // Release the slot first so its Arc no longer counts
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = table.get(&self.basket_id)
            && Arc::strong_count(slot) == 1
        {
            table.remove(&self.basket_id);
        }
    }
}
