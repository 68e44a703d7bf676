use chrono::{DateTime, Utc};

use crate::{AuditAction, AuditEntry, BasketId};

/// Builder for constructing audit queries.
///
/// Allows filtering entries by basket, action, and time range.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Filter by basket ID.
    pub basket_id: Option<BasketId>,

    /// Filter by actions (any of these).
    pub actions: Option<Vec<AuditAction>>,

    /// Filter by entries at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by entries at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl AuditQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific basket.
    pub fn for_basket(basket_id: BasketId) -> Self {
        Self {
            basket_id: Some(basket_id),
            ..Default::default()
        }
    }

    /// Filters by a single action.
    pub fn action(mut self, action: AuditAction) -> Self {
        self.actions = Some(vec![action]);
        self
    }

    /// Filters by multiple actions (any of these).
    pub fn actions(mut self, actions: Vec<AuditAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Filters by entries at or after this timestamp.
    pub fn from_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(ts);
        self
    }

    /// Filters by entries at or before this timestamp.
    pub fn to_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(ts);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry passes every filter except paging.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref id) = self.basket_id
            && &entry.basket_id != id
        {
            return false;
        }
        if let Some(ref actions) = self.actions
            && !actions.contains(&entry.action)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && entry.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && entry.timestamp > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::Item;

    use super::*;

    fn entry(basket: &str, action: AuditAction, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry::new(BasketId::new(basket), action, Vec::<Item>::new(), at)
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = AuditQuery::new();
        assert!(query.matches(&entry("b1", AuditAction::Synced, Utc::now())));
    }

    #[test]
    fn filters_by_basket_and_action() {
        let query = AuditQuery::for_basket(BasketId::new("b1")).action(AuditAction::Paid);
        let now = Utc::now();

        assert!(query.matches(&entry("b1", AuditAction::Paid, now)));
        assert!(!query.matches(&entry("b1", AuditAction::Synced, now)));
        assert!(!query.matches(&entry("b2", AuditAction::Paid, now)));
    }

    #[test]
    fn filters_by_time_range_inclusive() {
        let now = Utc::now();
        let query = AuditQuery::new()
            .from_timestamp(now - Duration::minutes(5))
            .to_timestamp(now);

        assert!(query.matches(&entry("b1", AuditAction::Synced, now)));
        assert!(query.matches(&entry("b1", AuditAction::Synced, now - Duration::minutes(5))));
        assert!(!query.matches(&entry("b1", AuditAction::Synced, now - Duration::minutes(6))));
        assert!(!query.matches(&entry("b1", AuditAction::Synced, now + Duration::seconds(1))));
    }
}
