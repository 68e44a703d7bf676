//! Folds raw sensor identifiers into a priced item list.

use std::collections::HashMap;

use common::{Item, ItemId};

use super::catalog::Catalog;

/// Converts observed identifiers into deduplicated, quantity-counted items.
///
/// Identifiers the catalog does not know, and blank ones, are dropped as
/// sensor noise. Output order is the first-occurrence order of each distinct
/// identifier.
pub fn aggregate<S: AsRef<str>>(identifiers: &[S], catalog: &dyn Catalog) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut unknown: u64 = 0;

    for raw in identifiers {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            unknown += 1;
            continue;
        }

        if let Some(&pos) = positions.get(raw) {
            // positions only ever holds indices pushed below
            if let Some(item) = items.get_mut(pos) {
                item.quantity = item.quantity.saturating_add(1);
            }
            continue;
        }

        let item_id = ItemId::new(raw);
        match catalog.resolve(&item_id) {
            Some(entry) => {
                positions.insert(raw, items.len());
                items.push(Item::new(item_id, entry.name(), entry.unit_price(), 1));
            }
            None => {
                tracing::debug!(identifier = raw, "dropping identifier unknown to catalog");
                unknown += 1;
            }
        }
    }

    if unknown > 0 {
        metrics::counter!("basket_unknown_identifiers_total").increment(unknown);
    }

    items
}

/// Merges duplicate ids in a pre-built item list by summing quantities.
///
/// Keeps the first occurrence's name and price.
pub fn merge_items(items: Vec<Item>) -> Vec<Item> {
    let mut merged: Vec<Item> = Vec::with_capacity(items.len());
    let mut positions: HashMap<ItemId, usize> = HashMap::new();

    for item in items {
        if let Some(&pos) = positions.get(&item.id) {
            if let Some(existing) = merged.get_mut(pos) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
        } else {
            positions.insert(item.id.clone(), merged.len());
            merged.push(item);
        }
    }

    merged
}
