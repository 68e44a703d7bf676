use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{AuditEntry, AuditError, AuditQuery, AuditSink, BasketId, EntryId, Result};

#[derive(Default)]
struct Log {
    entries: Vec<AuditEntry>,
    ids: HashSet<EntryId>,
}

/// In-memory audit log implementation.
///
/// Stores entries in append order and provides the same interface as the
/// PostgreSQL implementation. Failures can be injected to exercise the
/// caller's retry and rollback paths.
#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    log: Arc<RwLock<Log>>,
    unavailable: Arc<AtomicBool>,
    failing_appends: Arc<AtomicUsize>,
    lost_acks: Arc<AtomicUsize>,
}

impl InMemoryAuditLog {
    /// Creates a new empty in-memory audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries stored.
    pub async fn entry_count(&self) -> usize {
        self.log.read().await.entries.len()
    }

    /// Makes every call fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` appends fail with `Unavailable`.
    pub fn fail_next_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` appends store their entry and then report
    /// `Unavailable`, as if the reply had been lost.
    pub fn lose_next_acks(&self, count: usize) {
        self.lost_acks.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("audit log offline".to_string()));
        }
        Ok(())
    }

    fn take_injected(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.check_available()?;
        if Self::take_injected(&self.failing_appends) {
            return Err(AuditError::Unavailable("injected append failure".to_string()));
        }

        {
            // Appending an entry id that is already stored is a no-op
            let mut log = self.log.write().await;
            if log.ids.insert(entry.entry_id) {
                log.entries.push(entry);
            }
        }

        if Self::take_injected(&self.lost_acks) {
            return Err(AuditError::Unavailable("append reply lost".to_string()));
        }
        Ok(())
    }

    async fn query_by_basket(&self, basket_id: &BasketId) -> Result<Vec<AuditEntry>> {
        self.query(AuditQuery::for_basket(basket_id.clone())).await
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        self.check_available()?;

        let log = self.log.read().await;
        let mut matching: Vec<_> = log
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        // Stable sort keeps append order for equal timestamps
        matching.sort_by_key(|e| e.timestamp);

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::{Item, Money};

    use super::*;
    use crate::AuditAction;

    fn entry(basket: &str, action: AuditAction) -> AuditEntry {
        AuditEntry::new(
            BasketId::new(basket),
            action,
            vec![Item::new("A", "Apple", Money::from_cents(50), 1)],
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn append_and_query_by_basket() {
        let log = InMemoryAuditLog::new();
        log.append(entry("b1", AuditAction::Synced)).await.unwrap();
        log.append(entry("b2", AuditAction::Synced)).await.unwrap();
        log.append(entry("b1", AuditAction::CheckoutStarted))
            .await
            .unwrap();

        let b1 = log.query_by_basket(&BasketId::new("b1")).await.unwrap();
        assert_eq!(b1.len(), 2);
        assert_eq!(b1[0].action, AuditAction::Synced);
        assert_eq!(b1[1].action, AuditAction::CheckoutStarted);
        assert_eq!(log.entry_count().await, 3);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_append_order() {
        let log = InMemoryAuditLog::new();
        let at = Utc::now();
        for action in [
            AuditAction::Synced,
            AuditAction::QuantityAdjusted,
            AuditAction::Paid,
        ] {
            let e = AuditEntry::new(BasketId::new("b1"), action, vec![], at);
            log.append(e).await.unwrap();
        }

        let actions: Vec<_> = log
            .query_by_basket(&BasketId::new("b1"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Synced,
                AuditAction::QuantityAdjusted,
                AuditAction::Paid
            ]
        );
    }

    #[tokio::test]
    async fn results_are_ordered_by_timestamp() {
        let log = InMemoryAuditLog::new();
        let now = Utc::now();
        let late = AuditEntry::new(BasketId::new("b1"), AuditAction::Paid, vec![], now);
        let early = AuditEntry::new(
            BasketId::new("b1"),
            AuditAction::Synced,
            vec![],
            now - Duration::seconds(10),
        );
        log.append(late).await.unwrap();
        log.append(early).await.unwrap();

        let entries = log.query_by_basket(&BasketId::new("b1")).await.unwrap();
        assert_eq!(entries[0].action, AuditAction::Synced);
        assert_eq!(entries[1].action, AuditAction::Paid);
    }

    #[tokio::test]
    async fn query_with_action_filter_and_paging() {
        let log = InMemoryAuditLog::new();
        for _ in 0..3 {
            log.append(entry("b1", AuditAction::Synced)).await.unwrap();
        }
        log.append(entry("b1", AuditAction::Paid)).await.unwrap();

        let synced = log
            .query(AuditQuery::for_basket(BasketId::new("b1")).action(AuditAction::Synced))
            .await
            .unwrap();
        assert_eq!(synced.len(), 3);

        let page = log
            .query(AuditQuery::for_basket(BasketId::new("b1")).offset(1).limit(2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_record_nothing() {
        let log = InMemoryAuditLog::new();
        log.fail_next_appends(2);

        assert!(log.append(entry("b1", AuditAction::Synced)).await.is_err());
        assert!(log.append(entry("b1", AuditAction::Synced)).await.is_err());
        assert!(log.append(entry("b1", AuditAction::Synced)).await.is_ok());
        assert_eq!(log.entry_count().await, 1);
    }

    #[tokio::test]
    async fn reappending_an_entry_id_stores_it_once() {
        let log = InMemoryAuditLog::new();
        let e = entry("b1", AuditAction::Synced);

        log.lose_next_acks(1);
        assert!(log.append(e.clone()).await.is_err());
        log.append(e.clone()).await.unwrap();

        let entries = log.query_by_basket(&BasketId::new("b1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, e.entry_id);
    }

    #[tokio::test]
    async fn unavailable_log_is_transient() {
        let log = InMemoryAuditLog::new();
        log.set_unavailable(true);

        let err = log.append(entry("b1", AuditAction::Synced)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(log.query_by_basket(&BasketId::new("b1")).await.is_err());

        log.set_unavailable(false);
        assert!(log.append(entry("b1", AuditAction::Synced)).await.is_ok());
    }
}
