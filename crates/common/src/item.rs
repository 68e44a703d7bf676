use serde::{Deserialize, Serialize};

use crate::{ItemId, Money};

/// A priced line in a basket.
///
/// Within one basket the `id` is unique; repeated sightings of the same
/// identifier are folded into `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Catalog identifier of the item.
    pub id: ItemId,

    /// Human-readable display name.
    pub name: String,

    /// Price per unit.
    pub unit_price: Money,

    /// Number of units present, always at least 1.
    pub quantity: u32,
}

impl Item {
    /// Creates a new item.
    pub fn new(
        id: impl Into<ItemId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the line total (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
