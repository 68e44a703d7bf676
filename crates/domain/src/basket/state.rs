//! Basket state machine.

use serde::{Deserialize, Serialize};

/// The status of a basket in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Active ──► Checkout ──┬──► Paid
///    │           │                  │
///    └───────────┴──────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BasketStatus {
    /// Basket exists but has not received a sensor snapshot yet.
    #[default]
    Pending,

    /// Basket is open and tracking sensor snapshots.
    Active,

    /// Checkout started at the terminal; only a decision may follow.
    Checkout,

    /// Payment confirmed (terminal state).
    Paid,

    /// Basket was voided (terminal state).
    Cancelled,
}

impl BasketStatus {
    /// Returns true if the basket accepts sensor snapshots and item edits.
    pub fn is_open(&self) -> bool {
        matches!(self, BasketStatus::Pending | BasketStatus::Active)
    }

    /// Returns true if checkout can be started (or re-displayed) in this state.
    pub fn can_checkout(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if a cashier decision can be recorded in this state.
    pub fn can_decide(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the expiry sweeper may retire a basket in this state.
    pub fn is_sweepable(&self) -> bool {
        self.is_open()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, BasketStatus::Paid | BasketStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BasketStatus::Pending => "PENDING",
            BasketStatus::Active => "ACTIVE",
            BasketStatus::Checkout => "CHECKOUT",
            BasketStatus::Paid => "PAID",
            BasketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BasketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BasketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BasketStatus::Pending),
            "ACTIVE" => Ok(BasketStatus::Active),
            "CHECKOUT" => Ok(BasketStatus::Checkout),
            "PAID" => Ok(BasketStatus::Paid),
            "CANCELLED" => Ok(BasketStatus::Cancelled),
            other => Err(format!("unknown basket status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BasketStatus; 5] = [
        BasketStatus::Pending,
        BasketStatus::Active,
        BasketStatus::Checkout,
        BasketStatus::Paid,
        BasketStatus::Cancelled,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(BasketStatus::default(), BasketStatus::Pending);
    }

    #[test]
    fn test_only_pending_and_active_are_open() {
        assert!(BasketStatus::Pending.is_open());
        assert!(BasketStatus::Active.is_open());
        assert!(!BasketStatus::Checkout.is_open());
        assert!(!BasketStatus::Paid.is_open());
        assert!(!BasketStatus::Cancelled.is_open());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BasketStatus::Pending.is_terminal());
        assert!(!BasketStatus::Active.is_terminal());
        assert!(!BasketStatus::Checkout.is_terminal());
        assert!(BasketStatus::Paid.is_terminal());
        assert!(BasketStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_no_transition_out_of_terminal_states() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            assert!(!status.is_open());
            assert!(!status.can_checkout());
            assert!(!status.can_decide());
            assert!(!status.is_sweepable());
        }
    }

    #[test]
    fn test_checkout_is_never_swept() {
        assert!(!BasketStatus::Checkout.is_sweepable());
        assert!(BasketStatus::Checkout.can_decide());
    }

    #[test]
    fn test_wire_names_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<BasketStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        assert!("OPEN".parse::<BasketStatus>().is_err());
    }
}
