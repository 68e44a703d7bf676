use chrono::{DateTime, Utc};
use common::{BasketId, Item, Money};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuditError;

/// Unique identifier for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The action recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A sensor snapshot replaced the basket contents.
    Synced,
    /// The terminal started checkout.
    CheckoutStarted,
    /// The cashier confirmed payment (terminal).
    Paid,
    /// The cashier cancelled the basket (terminal).
    Cancelled,
    /// An item quantity was corrected by hand.
    QuantityAdjusted,
    /// The expiry sweeper retired an idle basket.
    AutoCleanup,
}

impl AuditAction {
    /// Actions that end a basket session.
    pub const CLOSING: [AuditAction; 3] = [
        AuditAction::Paid,
        AuditAction::Cancelled,
        AuditAction::AutoCleanup,
    ];

    /// Returns true if this action ends the basket's session.
    pub fn is_closing(&self) -> bool {
        Self::CLOSING.contains(self)
    }

    /// Returns the wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Synced => "SYNCED",
            AuditAction::CheckoutStarted => "CHECKOUT_STARTED",
            AuditAction::Paid => "PAID",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::QuantityAdjusted => "QUANTITY_ADJUSTED",
            AuditAction::AutoCleanup => "AUTO_CLEANUP",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYNCED" => Ok(AuditAction::Synced),
            "CHECKOUT_STARTED" => Ok(AuditAction::CheckoutStarted),
            "PAID" => Ok(AuditAction::Paid),
            "CANCELLED" => Ok(AuditAction::Cancelled),
            "QUANTITY_ADJUSTED" => Ok(AuditAction::QuantityAdjusted),
            "AUTO_CLEANUP" => Ok(AuditAction::AutoCleanup),
            other => Err(AuditError::InvalidRecord(format!(
                "unknown audit action '{other}'"
            ))),
        }
    }
}

/// An immutable record of one state-changing action on a basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique identifier for this entry.
    pub entry_id: EntryId,

    /// The basket the action was taken against.
    pub basket_id: BasketId,

    /// What happened.
    pub action: AuditAction,

    /// Basket contents at the time of the action.
    pub items: Vec<Item>,

    /// Basket total at the time of the action.
    pub total: Money,

    /// Action-specific details (e.g. the adjusted item and delta).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,

    /// When the action was committed.
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry with a snapshot of `items`.
    pub fn new(
        basket_id: BasketId,
        action: AuditAction,
        items: Vec<Item>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let total = items.iter().map(Item::total_price).sum();
        Self {
            entry_id: EntryId::new(),
            basket_id,
            action,
            items,
            total,
            detail: serde_json::Value::Null,
            timestamp,
        }
    }

    /// Attaches action-specific details.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_wire_name() {
        for action in [
            AuditAction::Synced,
            AuditAction::CheckoutStarted,
            AuditAction::Paid,
            AuditAction::Cancelled,
            AuditAction::QuantityAdjusted,
            AuditAction::AutoCleanup,
        ] {
            let parsed: AuditAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn only_decisions_and_cleanup_close_a_session() {
        assert!(AuditAction::Paid.is_closing());
        assert!(AuditAction::AutoCleanup.is_closing());
        assert!(!AuditAction::CheckoutStarted.is_closing());
        assert!(!AuditAction::Synced.is_closing());
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result = "REFUNDED".parse::<AuditAction>();
        assert!(matches!(result, Err(AuditError::InvalidRecord(_))));
    }

    #[test]
    fn entry_captures_total_of_snapshot() {
        let items = vec![
            Item::new("A", "Apple", Money::from_cents(50), 4),
            Item::new("B", "Bread", Money::from_cents(300), 1),
        ];
        let entry = AuditEntry::new(BasketId::new("b1"), AuditAction::Synced, items, Utc::now());

        assert_eq!(entry.total.cents(), 500);
        assert_eq!(entry.items.len(), 2);
        assert!(entry.detail.is_null());
    }

    #[test]
    fn detail_is_omitted_from_json_when_empty() {
        let entry = AuditEntry::new(BasketId::new("b1"), AuditAction::Paid, vec![], Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("detail").is_none());
        assert_eq!(json["action"], "PAID");
        assert_eq!(json["basketId"], "b1");

        let with_detail = entry.with_detail(serde_json::json!({"delta": 1}));
        let json = serde_json::to_value(&with_detail).unwrap();
        assert_eq!(json["detail"]["delta"], 1);
    }
}
