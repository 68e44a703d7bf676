//! Basket commands.

use common::{BasketId, Item, ItemId};

use crate::error::{BasketError, Result};

/// A request that targets exactly one basket.
pub trait BasketCommand: Send + Sync {
    /// Returns the ID of the basket this command targets.
    fn basket_id(&self) -> &BasketId;

    /// Rejects payloads that are malformed regardless of basket state.
    fn validate(&self) -> Result<()> {
        if self.basket_id().is_blank() {
            return Err(BasketError::InvalidPayload(
                "basketId must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a sensor reported for one basket.
#[derive(Debug, Clone)]
pub enum SyncContents {
    /// Raw identifiers, one per observed unit; duplicates mean more units.
    Identifiers(Vec<String>),

    /// Pre-built items, already priced.
    Items(Vec<Item>),
}

/// Command to replace a basket's contents with a presence snapshot.
#[derive(Debug, Clone)]
pub struct SyncBasket {
    pub basket_id: BasketId,
    pub contents: SyncContents,
}

impl SyncBasket {
    /// Creates a sync from raw identifiers.
    pub fn from_identifiers<I, S>(basket_id: impl Into<BasketId>, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            basket_id: basket_id.into(),
            contents: SyncContents::Identifiers(identifiers.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a sync from a pre-built item list.
    pub fn from_items(basket_id: impl Into<BasketId>, items: Vec<Item>) -> Self {
        Self {
            basket_id: basket_id.into(),
            contents: SyncContents::Items(items),
        }
    }
}

impl BasketCommand for SyncBasket {
    fn basket_id(&self) -> &BasketId {
        &self.basket_id
    }

    fn validate(&self) -> Result<()> {
        if self.basket_id.is_blank() {
            return Err(BasketError::InvalidPayload(
                "basketId must not be empty".to_string(),
            ));
        }

        if let SyncContents::Items(items) = &self.contents {
            for item in items {
                if item.id.is_blank() {
                    return Err(BasketError::InvalidPayload(
                        "item id must not be empty".to_string(),
                    ));
                }
                if item.quantity == 0 {
                    return Err(BasketError::InvalidPayload(format!(
                        "item {} has quantity 0",
                        item.id
                    )));
                }
                if item.unit_price.is_negative() {
                    return Err(BasketError::InvalidPayload(format!(
                        "item {} has negative price {}",
                        item.id, item.unit_price
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Command to correct one item's quantity by a signed delta.
#[derive(Debug, Clone)]
pub struct AdjustQuantity {
    pub basket_id: BasketId,
    pub item_id: ItemId,

    /// Non-zero; the result is clamped at 1.
    pub delta: i64,
}

impl AdjustQuantity {
    pub fn new(basket_id: impl Into<BasketId>, item_id: impl Into<ItemId>, delta: i64) -> Self {
        Self {
            basket_id: basket_id.into(),
            item_id: item_id.into(),
            delta,
        }
    }
}

impl BasketCommand for AdjustQuantity {
    fn basket_id(&self) -> &BasketId {
        &self.basket_id
    }

    fn validate(&self) -> Result<()> {
        if self.basket_id.is_blank() || self.item_id.is_blank() {
            return Err(BasketError::InvalidPayload(
                "basketId and itemId must not be empty".to_string(),
            ));
        }
        if self.delta == 0 {
            return Err(BasketError::InvalidPayload(
                "delta must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command to record the cashier's verdict.
#[derive(Debug, Clone)]
pub struct RecordDecision {
    pub basket_id: BasketId,
    pub paid: bool,
}

impl RecordDecision {
    pub fn new(basket_id: impl Into<BasketId>, paid: bool) -> Self {
        Self {
            basket_id: basket_id.into(),
            paid,
        }
    }
}

impl BasketCommand for RecordDecision {
    fn basket_id(&self) -> &BasketId {
        &self.basket_id
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;

    #[test]
    fn blank_basket_id_is_rejected() {
        let cmd = SyncBasket::from_identifiers("  ", ["A"]);
        assert!(matches!(
            cmd.validate(),
            Err(BasketError::InvalidPayload(_))
        ));
        assert!(RecordDecision::new("", true).validate().is_err());
    }

    #[test]
    fn malformed_items_are_rejected() {
        let zero_qty = SyncBasket::from_items(
            "b1",
            vec![Item::new("A", "Apple", Money::from_cents(50), 0)],
        );
        assert!(zero_qty.validate().is_err());

        let negative = SyncBasket::from_items(
            "b1",
            vec![Item::new("A", "Apple", Money::from_cents(-50), 1)],
        );
        assert!(negative.validate().is_err());

        let blank_id =
            SyncBasket::from_items("b1", vec![Item::new("", "Apple", Money::zero(), 1)]);
        assert!(blank_id.validate().is_err());
    }

    #[test]
    fn identifier_snapshots_are_never_malformed() {
        let cmd = SyncBasket::from_identifiers("b1", ["", "UNKNOWN"]);
        assert!(cmd.validate().is_ok());

        let empty = SyncBasket::from_identifiers("b1", Vec::<String>::new());
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn zero_delta_is_rejected() {
        assert!(AdjustQuantity::new("b1", "A", 0).validate().is_err());
        assert!(AdjustQuantity::new("b1", "A", -3).validate().is_ok());
    }
}
