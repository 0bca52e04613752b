//! Subscription tracking and filtering.

use std::time::Instant;

use tokio::sync::mpsc;

use miniboard_proto::{ChangeEvent, ChangeType, EventFilter};

/// A subscription entry tracking an active registration.
#[derive(Debug)]
pub struct SubscriptionEntry {
    /// Unique subscription ID.
    pub id: u64,
    /// Table being watched.
    pub table: String,
    /// Change types delivered to this subscription.
    pub filter: EventFilter,
    /// Delivery channel to the subscriber.
    pub sender: mpsc::Sender<ChangeEvent>,
    /// When the subscription was created.
    pub created_at: Instant,
    /// Number of events delivered to this subscription.
    pub events_sent: u64,
}

impl SubscriptionEntry {
    /// Create a new subscription entry.
    pub fn new(
        id: u64,
        table: impl Into<String>,
        filter: EventFilter,
        sender: mpsc::Sender<ChangeEvent>,
    ) -> Self {
        Self {
            id,
            table: table.into(),
            filter,
            sender,
            created_at: Instant::now(),
            events_sent: 0,
        }
    }

    /// Whether a change of `change_type` on `table` should be delivered here.
    pub fn wants(&self, table: &str, change_type: ChangeType) -> bool {
        self.table == table && self.filter.matches(change_type)
    }

    /// Get the age of this subscription.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Whether the subscriber dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Increment the events sent counter.
    pub fn record_event(&mut self) {
        self.events_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_entry() {
        let (tx, _rx) = mpsc::channel(1);
        let entry = SubscriptionEntry::new(1, "posts", EventFilter::INSERT_ONLY, tx);

        assert_eq!(entry.id, 1);
        assert_eq!(entry.table, "posts");
        assert_eq!(entry.events_sent, 0);
        assert!(!entry.is_closed());
    }

    #[test]
    fn test_subscription_wants() {
        let (tx, _rx) = mpsc::channel(1);
        let entry = SubscriptionEntry::new(1, "posts", EventFilter::INSERT_ONLY, tx);

        assert!(entry.wants("posts", ChangeType::Insert));
        assert!(!entry.wants("posts", ChangeType::Delete));
        assert!(!entry.wants("users", ChangeType::Insert));
    }

    #[test]
    fn test_closed_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let entry = SubscriptionEntry::new(1, "posts", EventFilter::ALL, tx);
        drop(rx);
        assert!(entry.is_closed());
    }
}
