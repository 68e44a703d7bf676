//! Basket persistence.
//!
//! The store holds the current state of each basket; history lives in the
//! audit log. Implementations never read or write the audit log themselves.

mod memory;
mod postgres;

pub use memory::InMemoryBasketStore;
pub use postgres::PostgresBasketStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::BasketId;
use thiserror::Error;

use crate::basket::{Basket, BasketStatus};

/// Errors raised by basket store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row could not be turned back into a basket.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Filter for scanning baskets.
#[derive(Debug, Clone, Default)]
pub struct BasketScan {
    /// Only baskets in one of these statuses. Empty means any status.
    pub statuses: Vec<BasketStatus>,

    /// Only baskets whose `updated_at` is strictly before this instant.
    pub updated_before: Option<DateTime<Utc>>,
}

impl BasketScan {
    /// Matches every basket.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches open baskets untouched since `cutoff`.
    pub fn idle_since(cutoff: DateTime<Utc>) -> Self {
        Self {
            statuses: vec![BasketStatus::Pending, BasketStatus::Active],
            updated_before: Some(cutoff),
        }
    }

    /// Restricts the scan to one status.
    pub fn status(mut self, status: BasketStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Checks whether a basket passes this filter.
    pub fn matches(&self, basket: &Basket) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&basket.status()) {
            return false;
        }
        if let Some(cutoff) = self.updated_before
            && basket.updated_at() >= cutoff
        {
            return false;
        }
        true
    }
}

/// Keyed storage of current basket state.
///
/// Each call is atomic for its key. All implementations must be thread-safe.
#[async_trait]
pub trait BasketStore: Send + Sync {
    /// Inserts or replaces the basket under its id.
    async fn upsert(&self, basket: Basket) -> StoreResult<()>;

    /// Looks up a basket by id.
    async fn find(&self, basket_id: &BasketId) -> StoreResult<Option<Basket>>;

    /// Removes a basket. Returns false if there was nothing to remove.
    async fn delete(&self, basket_id: &BasketId) -> StoreResult<bool>;

    /// Returns all baskets matching the filter, oldest `updated_at` first.
    async fn scan(&self, filter: &BasketScan) -> StoreResult<Vec<Basket>>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn idle_scan_uses_strict_cutoff_and_open_statuses() {
        let now = Utc::now();
        let basket = Basket::open(BasketId::new("b1"), now);

        assert!(BasketScan::idle_since(now + Duration::seconds(1)).matches(&basket));
        assert!(!BasketScan::idle_since(now).matches(&basket));
    }

    #[test]
    fn status_filter() {
        let basket = Basket::open(BasketId::new("b1"), Utc::now());

        assert!(BasketScan::all().matches(&basket));
        assert!(BasketScan::all().status(BasketStatus::Pending).matches(&basket));
        assert!(!BasketScan::all().status(BasketStatus::Paid).matches(&basket));
    }
}
