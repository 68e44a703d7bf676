//! Basket lifecycle service.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use audit_log::{AuditAction, AuditEntry, AuditError, AuditQuery, AuditSink};
use chrono::{DateTime, Utc};
use common::{BasketId, Item, Money};
use serde_json::json;

use super::aggregator::{aggregate, merge_items};
use super::catalog::Catalog;
use super::checkout::CheckoutPayload;
use super::commands::{AdjustQuantity, BasketCommand, RecordDecision, SyncBasket, SyncContents};
use super::{Basket, SyncOutcome};
use crate::clock::{Clock, SystemClock};
use crate::error::{BasketError, Result};
use crate::locks::BasketLocks;
use crate::store::{BasketScan, BasketStore};

const DEFAULT_AUDIT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Result of asking the service to retire one idle basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireOutcome {
    /// The basket was logged as AUTO_CLEANUP and removed.
    Retired,
    /// The basket was gone, no longer open, or touched since the scan.
    Skipped,
}

/// Service for managing basket sessions.
///
/// Every mutation runs under the basket's lock and follows the same commit
/// protocol: write the store, append one audit entry (retrying transient
/// failures), and undo the store write if the append cannot be recorded.
pub struct BasketService<S: BasketStore, A: AuditSink> {
    store: S,
    audit: A,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    locks: BasketLocks,
    audit_attempts: u32,
    retry_backoff: Duration,
}

impl<S: BasketStore, A: AuditSink> BasketService<S, A> {
    /// Creates a service using the system clock.
    pub fn new(store: S, audit: A, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store,
            audit,
            catalog,
            clock: Arc::new(SystemClock),
            locks: BasketLocks::new(),
            audit_attempts: DEFAULT_AUDIT_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets how many times an audit append is attempted before rolling back.
    pub fn with_audit_attempts(mut self, attempts: u32) -> Self {
        self.audit_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay between audit append attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn locks(&self) -> &BasketLocks {
        &self.locks
    }

    /// Current time according to the service's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Replaces a basket's contents with a sensor snapshot, creating the
    /// basket if needed.
    #[tracing::instrument(skip(self, cmd), fields(basket_id = %cmd.basket_id))]
    pub async fn sync(&self, cmd: SyncBasket) -> Result<Basket> {
        cmd.validate()?;
        let (items, seen) = self.resolve_contents(cmd.contents);

        let _guard = self.locks.acquire(&cmd.basket_id).await;

        let previous = self.store.find(&cmd.basket_id).await?;
        let now = self.now();
        let mut basket = match &previous {
            Some(basket) => basket.clone(),
            None => {
                let opened_at = self.session_start(&cmd.basket_id, now).await?;
                Basket::open(cmd.basket_id.clone(), opened_at)
            }
        };

        match basket.replace_items(items, seen, now)? {
            SyncOutcome::Unchanged => {
                self.store.upsert(basket.clone()).await?;
                tracing::debug!("repeated snapshot, no audit entry");
            }
            SyncOutcome::Changed => {
                let entry = AuditEntry::new(
                    basket.id().clone(),
                    AuditAction::Synced,
                    basket.items().to_vec(),
                    basket.updated_at(),
                );
                self.commit(&cmd.basket_id, previous, Some(&basket), entry)
                    .await?;
                metrics::counter!("basket_syncs_total").increment(1);
                tracing::info!(items = basket.item_count(), total = %basket.total(), "basket synced");
            }
        }

        Ok(basket)
    }

    /// Corrects one item's quantity. Returns the updated item.
    #[tracing::instrument(skip(self, cmd), fields(basket_id = %cmd.basket_id, item_id = %cmd.item_id))]
    pub async fn adjust_quantity(&self, cmd: AdjustQuantity) -> Result<Item> {
        cmd.validate()?;
        let _guard = self.locks.acquire(&cmd.basket_id).await;

        let previous = self.load(&cmd.basket_id).await?;
        let mut basket = previous.clone();
        let item = basket.adjust_quantity(&cmd.item_id, cmd.delta, self.now())?;

        let direction = if cmd.delta > 0 {
            "increment"
        } else {
            "decrement"
        };
        let entry = AuditEntry::new(
            basket.id().clone(),
            AuditAction::QuantityAdjusted,
            basket.items().to_vec(),
            basket.updated_at(),
        )
        .with_detail(json!({
            "itemId": item.id,
            "delta": cmd.delta,
            "direction": direction,
            "quantity": item.quantity,
        }));
        self.commit(&cmd.basket_id, Some(previous), Some(&basket), entry)
            .await?;

        metrics::counter!("basket_quantity_adjustments_total").increment(1);
        tracing::info!(delta = cmd.delta, quantity = item.quantity, "quantity adjusted");
        Ok(item)
    }

    /// Starts checkout and returns the payload for the terminal.
    ///
    /// Repeating checkout while already in checkout returns the same payload
    /// without logging again.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, basket_id: &BasketId) -> Result<CheckoutPayload> {
        require_id(basket_id)?;
        let _guard = self.locks.acquire(basket_id).await;

        let previous = self.load(basket_id).await?;
        let mut basket = previous.clone();

        if basket.start_checkout(self.now())? {
            let entry = AuditEntry::new(
                basket_id.clone(),
                AuditAction::CheckoutStarted,
                basket.items().to_vec(),
                basket.updated_at(),
            );
            self.commit(basket_id, Some(previous), Some(&basket), entry)
                .await?;
            metrics::counter!("basket_checkouts_total").increment(1);
            tracing::info!(total = %basket.total(), "checkout started");
        }

        Ok(CheckoutPayload::for_basket(basket_id))
    }

    /// Records the cashier's decision, moving the basket to PAID or CANCELLED.
    #[tracing::instrument(skip(self, cmd), fields(basket_id = %cmd.basket_id, paid = cmd.paid))]
    pub async fn decide(&self, cmd: RecordDecision) -> Result<Basket> {
        cmd.validate()?;
        let _guard = self.locks.acquire(&cmd.basket_id).await;

        let previous = self.load(&cmd.basket_id).await?;
        let mut basket = previous.clone();
        let status = basket.decide(cmd.paid, self.now())?;

        let action = if cmd.paid {
            AuditAction::Paid
        } else {
            AuditAction::Cancelled
        };
        let entry = AuditEntry::new(
            basket.id().clone(),
            action,
            basket.items().to_vec(),
            basket.updated_at(),
        );
        self.commit(&cmd.basket_id, Some(previous), Some(&basket), entry)
            .await?;

        metrics::counter!("basket_decisions_total", "outcome" => status.as_str()).increment(1);
        tracing::info!(%status, total = %basket.total(), "decision recorded");
        Ok(basket)
    }

    /// Returns the basket total.
    pub async fn get_total(&self, basket_id: &BasketId) -> Result<Money> {
        Ok(self.load(basket_id).await?.total())
    }

    /// Returns the current basket snapshot.
    pub async fn get(&self, basket_id: &BasketId) -> Result<Basket> {
        self.load(basket_id).await
    }

    /// Returns a basket's audit history, oldest first.
    ///
    /// Retired baskets keep their history; an unknown id yields an empty list.
    pub async fn audit_trail(&self, basket_id: &BasketId) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.query_by_basket(basket_id).await?)
    }

    pub async fn audit_query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        Ok(self.audit.query(query).await?)
    }

    /// Lists open baskets untouched since `cutoff`, oldest first.
    pub async fn idle_baskets(&self, cutoff: DateTime<Utc>) -> Result<Vec<Basket>> {
        Ok(self.store.scan(&BasketScan::idle_since(cutoff)).await?)
    }

    /// Retires a basket if it is still open and idle since `cutoff`.
    ///
    /// Idleness is re-checked under the basket's lock, so a basket touched
    /// after the sweeper's scan is left alone.
    #[tracing::instrument(skip(self))]
    pub async fn retire_idle(
        &self,
        basket_id: &BasketId,
        cutoff: DateTime<Utc>,
    ) -> Result<RetireOutcome> {
        let _guard = self.locks.acquire(basket_id).await;

        let Some(basket) = self.store.find(basket_id).await? else {
            return Ok(RetireOutcome::Skipped);
        };
        if !basket.is_idle_since(cutoff) {
            tracing::debug!(status = %basket.status(), "basket no longer idle");
            return Ok(RetireOutcome::Skipped);
        }

        let timestamp = basket.updated_at().max(self.now());
        let entry = AuditEntry::new(
            basket_id.clone(),
            AuditAction::AutoCleanup,
            basket.items().to_vec(),
            timestamp,
        );
        self.commit(basket_id, Some(basket), None, entry).await?;

        tracing::info!("idle basket retired");
        Ok(RetireOutcome::Retired)
    }

    /// Start time for a new session under a reused id: never earlier than
    /// the id's last audit entry, so its history stays in order.
    async fn session_start(
        &self,
        basket_id: &BasketId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let history = self.audit.query_by_basket(basket_id).await?;
        Ok(history.last().map_or(now, |entry| entry.timestamp.max(now)))
    }

    async fn load(&self, basket_id: &BasketId) -> Result<Basket> {
        self.store
            .find(basket_id)
            .await?
            .ok_or_else(|| BasketError::BasketNotFound(basket_id.clone()))
    }

    fn resolve_contents(&self, contents: SyncContents) -> (Vec<Item>, BTreeSet<String>) {
        match contents {
            SyncContents::Identifiers(identifiers) => {
                let items = aggregate(identifiers.as_slice(), self.catalog.as_ref());
                let seen = identifiers
                    .into_iter()
                    .filter(|id| !id.trim().is_empty())
                    .collect();
                (items, seen)
            }
            SyncContents::Items(items) => {
                let items = merge_items(items);
                let seen = items.iter().map(|item| item.id.to_string()).collect();
                (items, seen)
            }
        }
    }

    /// Writes the store, then the audit entry. `next = None` deletes.
    async fn commit(
        &self,
        basket_id: &BasketId,
        previous: Option<Basket>,
        next: Option<&Basket>,
        entry: AuditEntry,
    ) -> Result<()> {
        match next {
            Some(basket) => self.store.upsert(basket.clone()).await?,
            None => {
                self.store.delete(basket_id).await?;
            }
        }

        if let Err(err) = self.append_with_retry(entry).await {
            self.roll_back(basket_id, previous).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn append_with_retry(&self, entry: AuditEntry) -> std::result::Result<(), AuditError> {
        let mut attempt = 1;
        loop {
            match self.audit.append(entry.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.audit_attempts => {
                    tracing::warn!(attempt, error = %err, "audit append failed, retrying");
                    metrics::counter!("basket_audit_retries_total").increment(1);
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Restores the store to `previous`, retrying transient failures with the
    /// same bound as audit appends.
    async fn roll_back(&self, basket_id: &BasketId, previous: Option<Basket>) {
        metrics::counter!("basket_rollbacks_total").increment(1);

        let mut attempt = 1;
        loop {
            let result = match &previous {
                Some(basket) => self.store.upsert(basket.clone()).await,
                None => self.store.delete(basket_id).await.map(|_| ()),
            };
            match result {
                Ok(()) => {
                    tracing::warn!(%basket_id, attempt, "store write rolled back after audit failure");
                    return;
                }
                Err(err) if err.is_transient() && attempt < self.audit_attempts => {
                    tracing::warn!(%basket_id, attempt, error = %err, "rollback failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::counter!("basket_rollback_failures_total").increment(1);
                    tracing::error!(
                        %basket_id,
                        error = %err,
                        "rollback failed, store and audit log disagree"
                    );
                    return;
                }
            }
        }
    }
}

fn require_id(basket_id: &BasketId) -> Result<()> {
    if basket_id.is_blank() {
        return Err(BasketError::InvalidPayload(
            "basketId must not be empty".to_string(),
        ));
    }
    Ok(())
}
