use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::BasketId;
use tokio::sync::RwLock;

use super::{BasketScan, BasketStore, StoreError, StoreResult};
use crate::basket::Basket;

/// In-memory basket store.
///
/// Provides the same interface as the PostgreSQL implementation. The store
/// can be switched offline to exercise the caller's failure paths.
#[derive(Clone, Default)]
pub struct InMemoryBasketStore {
    baskets: Arc<RwLock<HashMap<BasketId, Basket>>>,
    unavailable: Arc<AtomicBool>,
    failing_writes: Arc<AtomicUsize>,
}

impl InMemoryBasketStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored baskets.
    pub async fn len(&self) -> usize {
        self.baskets.read().await.len()
    }

    /// Returns true if no baskets are stored.
    pub async fn is_empty(&self) -> bool {
        self.baskets.read().await.is_empty()
    }

    /// Makes every call fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` writes (upserts or deletes) fail with
    /// `Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("basket store offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> StoreResult<()> {
        self.check_available()?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BasketStore for InMemoryBasketStore {
    async fn upsert(&self, basket: Basket) -> StoreResult<()> {
        self.check_writable()?;
        self.baskets
            .write()
            .await
            .insert(basket.id().clone(), basket);
        Ok(())
    }

    async fn find(&self, basket_id: &BasketId) -> StoreResult<Option<Basket>> {
        self.check_available()?;
        Ok(self.baskets.read().await.get(basket_id).cloned())
    }

    async fn delete(&self, basket_id: &BasketId) -> StoreResult<bool> {
        self.check_writable()?;
        Ok(self.baskets.write().await.remove(basket_id).is_some())
    }

    async fn scan(&self, filter: &BasketScan) -> StoreResult<Vec<Basket>> {
        self.check_available()?;

        let baskets = self.baskets.read().await;
        let mut matching: Vec<_> = baskets
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.updated_at()
                .cmp(&b.updated_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(matching)
    }
}
