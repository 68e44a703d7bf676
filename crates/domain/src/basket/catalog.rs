//! Product catalog lookup.

use std::collections::HashMap;
use std::path::Path;

use common::{ItemId, Money};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog price below zero is malformed data.
    #[error("Invalid price for {item_id}: {price} (must not be negative)")]
    NegativePrice { item_id: String, price: Money },

    /// The catalog file could not be read.
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog file is not valid JSON.
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Display name and unit price for one catalog identifier.
///
/// The price is never negative; `new` is the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    name: String,
    unit_price: Money,
}

impl CatalogEntry {
    /// Creates an entry, rejecting negative prices. Zero is allowed.
    pub fn new(
        item_id: &ItemId,
        name: impl Into<String>,
        unit_price: Money,
    ) -> Result<Self, CatalogError> {
        if unit_price.is_negative() {
            return Err(CatalogError::NegativePrice {
                item_id: item_id.to_string(),
                price: unit_price,
            });
        }
        Ok(Self {
            name: name.into(),
            unit_price,
        })
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit price.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }
}

/// Maps an item identifier to its catalog entry.
pub trait Catalog: Send + Sync {
    /// Looks up an identifier; `None` if the catalog does not know it.
    fn resolve(&self, item_id: &ItemId) -> Option<CatalogEntry>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    name: String,
    price_cents: i64,
}

/// Catalog held in memory, optionally loaded from a JSON file.
///
/// File format: `{"<uid>": {"name": "Milk 1L", "priceCents": 129}}`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<ItemId, CatalogEntry>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(
        &mut self,
        item_id: impl Into<ItemId>,
        name: impl Into<String>,
        unit_price: Money,
    ) -> Result<(), CatalogError> {
        let item_id = item_id.into();
        let entry = CatalogEntry::new(&item_id, name, unit_price)?;
        self.entries.insert(item_id, entry);
        Ok(())
    }

    /// Builder-style variant of `insert`.
    pub fn with_entry(
        mut self,
        item_id: impl Into<ItemId>,
        name: impl Into<String>,
        unit_price: Money,
    ) -> Result<Self, CatalogError> {
        self.insert(item_id, name, unit_price)?;
        Ok(self)
    }

    /// Parses a catalog from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (uid, entry) in raw {
            catalog.insert(uid, entry.name, Money::from_cents(entry.price_cents))?;
        }
        Ok(catalog)
    }

    /// Loads a catalog from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn resolve(&self, item_id: &ItemId) -> Option<CatalogEntry> {
        self.entries.get(item_id).cloned()
    }
}
