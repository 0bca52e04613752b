//! Pub-sub manager for handling subscriptions and publishing events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use miniboard_client::Subscription;
use miniboard_proto::{ChangeEvent, EventFilter};

use super::subscription::SubscriptionEntry;
use crate::changelog::ChangeLogEntry;

/// Manager for change-feed subscriptions and event fan-out.
pub struct PubSubManager {
    /// Active subscriptions keyed by subscription ID.
    subscriptions: RwLock<HashMap<u64, SubscriptionEntry>>,
    /// Index of subscriptions by table.
    table_index: RwLock<HashMap<String, Vec<u64>>>,
    /// Next subscription ID.
    next_subscription_id: AtomicU64,
    /// Deliver every event twice (at-least-once simulation).
    duplicate_delivery: AtomicBool,
}

impl PubSubManager {
    /// Create a new pub-sub manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            table_index: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
            duplicate_delivery: AtomicBool::new(false),
        }
    }

    /// Subscribe to changes of a table.
    ///
    /// Events are delivered on a channel of the given capacity.
    pub fn subscribe(&self, table: &str, filter: EventFilter, capacity: usize) -> Subscription {
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(capacity.max(1));

        self.subscriptions.write().insert(
            subscription_id,
            SubscriptionEntry::new(subscription_id, table, filter, tx),
        );
        self.table_index
            .write()
            .entry(table.to_string())
            .or_default()
            .push(subscription_id);

        tracing::debug!(
            subscription_id,
            table,
            filter = %filter,
            "subscription created"
        );

        Subscription::new(subscription_id, table, filter, rx)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, subscription_id: u64) -> bool {
        let entry = self.subscriptions.write().remove(&subscription_id);

        let Some(entry) = entry else {
            return false;
        };

        {
            let mut index = self.table_index.write();
            if let Some(ids) = index.get_mut(&entry.table) {
                ids.retain(|&id| id != subscription_id);
                if ids.is_empty() {
                    index.remove(&entry.table);
                }
            }
        }

        tracing::debug!(
            subscription_id,
            table = %entry.table,
            events_sent = entry.events_sent,
            age_ms = entry.age().as_millis() as u64,
            "subscription removed"
        );

        true
    }

    /// Deliver a committed change to every matching subscription.
    ///
    /// Delivery applies backpressure: a full subscriber channel is waited
    /// on rather than skipped, so every subscriber sees every matching
    /// change in commit order. Subscribers whose receiver is gone are
    /// pruned. Returns the number of deliveries made.
    pub async fn publish(&self, entry: &ChangeLogEntry) -> usize {
        let subscription_ids = match self.table_index.read().get(&entry.table) {
            Some(ids) => ids.clone(),
            None => return 0,
        };

        let copies = if self.duplicate_delivery.load(Ordering::SeqCst) {
            2
        } else {
            1
        };

        let mut closed = Vec::new();
        let targets: Vec<(u64, mpsc::Sender<ChangeEvent>)> = {
            let subs = self.subscriptions.read();
            subscription_ids
                .into_iter()
                .filter_map(|id| subs.get(&id))
                .filter(|sub| sub.wants(&entry.table, entry.change_type))
                .filter_map(|sub| {
                    if sub.is_closed() {
                        closed.push(sub.id);
                        None
                    } else {
                        Some((sub.id, sub.sender.clone()))
                    }
                })
                .collect()
        };

        let mut delivered = 0;
        for (subscription_id, sender) in targets {
            let event = ChangeEvent {
                subscription_id,
                table: entry.table.clone(),
                change_type: entry.change_type,
                new: entry.new.clone(),
                old: entry.old.clone(),
                commit_timestamp: entry.timestamp,
            };

            for _ in 0..copies {
                if sender.capacity() == 0 {
                    tracing::debug!(
                        subscription_id,
                        lsn = entry.lsn,
                        "subscriber channel full, waiting"
                    );
                }
                if sender.send(event.clone()).await.is_err() {
                    closed.push(subscription_id);
                    break;
                }
                if let Some(sub) = self.subscriptions.write().get_mut(&subscription_id) {
                    sub.record_event();
                }
                delivered += 1;
            }
        }

        for subscription_id in closed {
            self.unsubscribe(subscription_id);
        }

        tracing::trace!(
            table = %entry.table,
            change_type = %entry.change_type,
            delivered,
            "published change event"
        );

        delivered
    }

    /// Toggle duplicate delivery of every event.
    pub fn set_duplicate_delivery(&self, enabled: bool) {
        self.duplicate_delivery.store(enabled, Ordering::SeqCst);
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Number of events delivered to a subscription so far.
    pub fn events_sent(&self, subscription_id: u64) -> Option<u64> {
        self.subscriptions
            .read()
            .get(&subscription_id)
            .map(|entry| entry.events_sent)
    }
}

impl Default for PubSubManager {
    fn default() -> Self {
        Self::new()
    }
}
