//! Basket entity and lifecycle.

mod aggregator;
mod catalog;
mod checkout;
mod commands;
mod service;
mod state;

pub use aggregator::{aggregate, merge_items};
pub use catalog::{Catalog, CatalogEntry, CatalogError, InMemoryCatalog};
pub use checkout::{CheckoutPayload, PlainTextEncoder, QrEncoder};
pub use commands::{AdjustQuantity, BasketCommand, RecordDecision, SyncBasket, SyncContents};
pub use service::{BasketService, RetireOutcome};
pub use state::BasketStatus;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{BasketId, Item, ItemId, Money};
use serde::{Deserialize, Serialize};

use crate::error::{BasketError, Result};

/// Whether a sync changed what the basket holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The snapshot replaced the item list (or opened the basket).
    Changed,
    /// The snapshot repeated the current contents; only `updated_at` moved.
    Unchanged,
}

/// A per-customer basket session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    id: BasketId,
    status: BasketStatus,

    /// Insertion order is the first-seen order of identifiers.
    items: Vec<Item>,

    /// Distinct raw identifiers of the last accepted snapshot.
    seen_identifiers: BTreeSet<String>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Query methods
impl Basket {
    /// Creates an empty pending basket.
    pub fn open(id: BasketId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: BasketStatus::Pending,
            items: Vec::new(),
            seen_identifiers: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn from_parts(
        id: BasketId,
        status: BasketStatus,
        items: Vec<Item>,
        seen_identifiers: BTreeSet<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status,
            items,
            seen_identifiers,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &BasketId {
        &self.id
    }

    pub fn status(&self) -> BasketStatus {
        self.status
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn seen_identifiers(&self) -> &BTreeSet<String> {
        &self.seen_identifiers
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns an item by id.
    pub fn get_item(&self, item_id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Returns the number of distinct items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of all line totals. Zero for an empty basket.
    pub fn total(&self) -> Money {
        self.items.iter().map(Item::total_price).sum()
    }

    /// Returns true if the basket is paid or cancelled.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the basket is open and last changed before `cutoff`.
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_sweepable() && self.updated_at < cutoff
    }
}

// Transitions
impl Basket {
    /// Advances `updated_at`, never moving it backwards, and returns the
    /// timestamp to record for the mutation.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.updated_at = self.updated_at.max(now);
        self.updated_at
    }

    /// Replaces the item list with a presence snapshot.
    pub(crate) fn replace_items(
        &mut self,
        items: Vec<Item>,
        seen_identifiers: BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        if !self.status.is_open() {
            return Err(BasketError::InvalidState {
                current: self.status,
                action: "sync",
            });
        }

        self.touch(now);

        let repeated = self.status == BasketStatus::Active
            && self.items == items
            && self.seen_identifiers == seen_identifiers;
        if repeated {
            return Ok(SyncOutcome::Unchanged);
        }

        self.items = items;
        self.seen_identifiers = seen_identifiers;
        self.status = BasketStatus::Active;
        Ok(SyncOutcome::Changed)
    }

    /// Applies a quantity correction, clamping at 1. Returns the updated item.
    pub(crate) fn adjust_quantity(
        &mut self,
        item_id: &ItemId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        if !self.status.is_open() {
            return Err(BasketError::InvalidState {
                current: self.status,
                action: "adjust quantity of",
            });
        }
        if delta == 0 {
            return Err(BasketError::InvalidPayload(
                "delta must be non-zero".to_string(),
            ));
        }

        let basket_id = self.id.clone();
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| BasketError::ItemNotFound {
                basket_id,
                item_id: item_id.clone(),
            })?;

        let adjusted = i64::from(item.quantity)
            .saturating_add(delta)
            .clamp(1, i64::from(u32::MAX));
        item.quantity = u32::try_from(adjusted).unwrap_or(u32::MAX);
        let updated = item.clone();

        self.touch(now);
        Ok(updated)
    }

    /// Moves the basket into checkout.
    ///
    /// Returns false if it was already in checkout (nothing changed).
    pub(crate) fn start_checkout(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if !self.status.can_checkout() {
            return Err(BasketError::InvalidState {
                current: self.status,
                action: "check out",
            });
        }
        if self.status == BasketStatus::Checkout {
            return Ok(false);
        }

        self.status = BasketStatus::Checkout;
        self.touch(now);
        Ok(true)
    }

    /// Records the cashier decision and returns the terminal status.
    pub(crate) fn decide(&mut self, paid: bool, now: DateTime<Utc>) -> Result<BasketStatus> {
        if !self.status.can_decide() {
            return Err(BasketError::InvalidState {
                current: self.status,
                action: "decide",
            });
        }

        self.status = if paid {
            BasketStatus::Paid
        } else {
            BasketStatus::Cancelled
        };
        self.touch(now);
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn basket_with(items: Vec<Item>) -> Basket {
        let now = Utc::now();
        let mut basket = Basket::open(BasketId::new("b1"), now);
        let seen = items.iter().map(|i| i.id.to_string()).collect();
        basket.replace_items(items, seen, now).unwrap();
        basket
    }

    fn milk(quantity: u32) -> Item {
        Item::new("MILK", "Milk", Money::from_cents(129), quantity)
    }

    #[test]
    fn new_basket_is_pending_and_empty() {
        let basket = Basket::open(BasketId::new("b1"), Utc::now());
        assert_eq!(basket.status(), BasketStatus::Pending);
        assert!(basket.items().is_empty());
        assert!(basket.total().is_zero());
    }

    #[test]
    fn sync_replaces_items_and_activates() {
        let mut basket = basket_with(vec![milk(1)]);
        assert_eq!(basket.status(), BasketStatus::Active);

        let bread = Item::new("BREAD", "Bread", Money::from_cents(300), 1);
        let outcome = basket
            .replace_items(
                vec![bread.clone()],
                BTreeSet::from(["BREAD".to_string()]),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Changed);
        assert_eq!(basket.items(), &[bread]);
    }

    #[test]
    fn repeated_snapshot_is_unchanged_but_touches() {
        let mut basket = basket_with(vec![milk(2)]);
        let later = basket.updated_at() + Duration::seconds(5);

        let outcome = basket
            .replace_items(vec![milk(2)], BTreeSet::from(["MILK".to_string()]), later)
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(basket.updated_at(), later);
    }

    #[test]
    fn empty_snapshot_on_pending_basket_activates_it() {
        let mut basket = Basket::open(BasketId::new("b1"), Utc::now());
        let outcome = basket
            .replace_items(vec![], BTreeSet::new(), Utc::now())
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Changed);
        assert_eq!(basket.status(), BasketStatus::Active);
    }

    #[test]
    fn sync_rejected_outside_open_states() {
        let mut basket = basket_with(vec![milk(1)]);
        basket.start_checkout(Utc::now()).unwrap();

        let result = basket.replace_items(vec![], BTreeSet::new(), Utc::now());
        assert!(matches!(
            result,
            Err(BasketError::InvalidState {
                current: BasketStatus::Checkout,
                ..
            })
        ));
    }

    #[test]
    fn quantity_is_clamped_at_one() {
        let mut basket = basket_with(vec![milk(1)]);
        let item = basket
            .adjust_quantity(&ItemId::new("MILK"), -5, Utc::now())
            .unwrap();
        assert_eq!(item.quantity, 1);

        let item = basket
            .adjust_quantity(&ItemId::new("MILK"), 3, Utc::now())
            .unwrap();
        assert_eq!(item.quantity, 4);
        assert_eq!(basket.total().cents(), 516);
    }

    #[test]
    fn extreme_deltas_saturate() {
        let mut basket = basket_with(vec![milk(3)]);
        let item = basket
            .adjust_quantity(&ItemId::new("MILK"), i64::MAX, Utc::now())
            .unwrap();
        assert_eq!(item.quantity, u32::MAX);

        let item = basket
            .adjust_quantity(&ItemId::new("MILK"), i64::MIN, Utc::now())
            .unwrap();
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn adjusting_missing_item_fails() {
        let mut basket = basket_with(vec![milk(1)]);
        let result = basket.adjust_quantity(&ItemId::new("EGGS"), 1, Utc::now());
        assert!(matches!(result, Err(BasketError::ItemNotFound { .. })));
    }

    #[test]
    fn zero_delta_is_invalid() {
        let mut basket = basket_with(vec![milk(1)]);
        let result = basket.adjust_quantity(&ItemId::new("MILK"), 0, Utc::now());
        assert!(matches!(result, Err(BasketError::InvalidPayload(_))));
    }

    #[test]
    fn checkout_is_idempotent_until_decided() {
        let mut basket = basket_with(vec![milk(1)]);
        assert!(basket.start_checkout(Utc::now()).unwrap());
        assert!(!basket.start_checkout(Utc::now()).unwrap());

        basket.decide(true, Utc::now()).unwrap();
        assert!(basket.start_checkout(Utc::now()).is_err());
    }

    #[test]
    fn decide_twice_fails() {
        let mut basket = basket_with(vec![milk(1)]);
        assert_eq!(basket.decide(false, Utc::now()).unwrap(), BasketStatus::Cancelled);

        let result = basket.decide(true, Utc::now());
        assert!(matches!(
            result,
            Err(BasketError::InvalidState {
                current: BasketStatus::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut basket = basket_with(vec![milk(1)]);
        let before = basket.updated_at();

        let stamped = basket.touch(before - Duration::minutes(1));
        assert_eq!(stamped, before);
        assert_eq!(basket.updated_at(), before);
    }

    #[test]
    fn idleness_excludes_checkout_and_terminal() {
        let mut basket = basket_with(vec![milk(1)]);
        let cutoff = basket.updated_at() + Duration::minutes(1);
        assert!(basket.is_idle_since(cutoff));
        assert!(!basket.is_idle_since(basket.updated_at()));

        let at = basket.updated_at();
        basket.start_checkout(at).unwrap();
        assert!(!basket.is_idle_since(cutoff));
    }
}
