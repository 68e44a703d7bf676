use async_trait::async_trait;

use crate::{AuditEntry, AuditQuery, BasketId, Result};

/// Core trait for audit log implementations.
///
/// An audit sink is append-only: implementations must never rewrite or drop
/// entries. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one entry.
    ///
    /// Idempotent on `entry_id`: appending an entry whose id is already
    /// stored succeeds without storing it again. An error does not prove
    /// that nothing was recorded, so callers retry with the same entry.
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Retrieves all entries for a basket.
    ///
    /// Entries are returned in non-decreasing timestamp order; entries with
    /// equal timestamps keep their append order.
    async fn query_by_basket(&self, basket_id: &BasketId) -> Result<Vec<AuditEntry>>;

    /// Retrieves entries matching a query, ordered as in `query_by_basket`.
    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>>;
}
