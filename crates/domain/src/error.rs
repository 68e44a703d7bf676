//! Domain error types.

use audit_log::AuditError;
use common::{BasketId, ItemId};
use thiserror::Error;

use crate::basket::BasketStatus;
use crate::store::StoreError;

/// Errors that can occur during basket lifecycle operations.
#[derive(Debug, Error)]
pub enum BasketError {
    /// The request was malformed or missing required fields.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No basket exists under this id.
    #[error("Basket not found: {0}")]
    BasketNotFound(BasketId),

    /// The basket exists but does not contain the item.
    #[error("Item {item_id} not found in basket {basket_id}")]
    ItemNotFound {
        basket_id: BasketId,
        item_id: ItemId,
    },

    /// The operation is not permitted in the basket's current status.
    #[error("Invalid state: cannot {action} a basket in {current} state")]
    InvalidState {
        current: BasketStatus,
        action: &'static str,
    },

    /// The basket store failed. Nothing was changed; the call may be retried.
    #[error("Basket store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The audit log failed. Nothing was changed; the call may be retried.
    #[error("Audit log unavailable: {0}")]
    AuditUnavailable(#[from] AuditError),
}

impl BasketError {
    /// Returns true for downstream I/O failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BasketError::StoreUnavailable(_) | BasketError::AuditUnavailable(_)
        )
    }
}

/// Result type for basket operations.
pub type Result<T> = std::result::Result<T, BasketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_retryable() {
        let store = BasketError::from(StoreError::Unavailable("down".to_string()));
        let audit = BasketError::from(AuditError::Unavailable("down".to_string()));
        assert!(store.is_retryable());
        assert!(audit.is_retryable());

        assert!(!BasketError::InvalidPayload("x".to_string()).is_retryable());
        assert!(!BasketError::BasketNotFound(BasketId::new("b")).is_retryable());
    }

    #[test]
    fn invalid_state_message_names_status_and_action() {
        let err = BasketError::InvalidState {
            current: BasketStatus::Paid,
            action: "decide",
        };
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot decide a basket in PAID state"
        );
    }
}
