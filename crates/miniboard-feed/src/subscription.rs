//! Change subscription adapter.
//!
//! Bridges the backend change feed into the view's event channel. At most
//! one backend registration is open at a time; a forwarding task moves
//! each delivered event onto the consumer channel until the adapter is
//! released or the feed closes.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use miniboard_client::PostsClient;
use miniboard_proto::{ChangeEvent, EventFilter};

use crate::error::{Error, Result};

/// Lifecycle of a [`ChangeSubscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionState::Unsubscribed => write!(f, "unsubscribed"),
            SubscriptionState::Subscribing => write!(f, "subscribing"),
            SubscriptionState::Subscribed => write!(f, "subscribed"),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: SubscriptionState,
    subscription_id: Option<u64>,
    forwarder: Option<JoinHandle<()>>,
    /// Bumped on every activation and release; stale activations compare
    /// against it before installing themselves.
    generation: u64,
}

/// One logical subscription to the posts change feed.
pub struct ChangeSubscription {
    client: PostsClient,
    filter: EventFilter,
    inner: Arc<Mutex<Inner>>,
}

impl ChangeSubscription {
    /// Create an adapter. Nothing is opened until [`activate`](Self::activate).
    pub fn new(client: PostsClient, filter: EventFilter) -> Self {
        Self {
            client,
            filter,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.inner.lock().state
    }

    /// Backend subscription id while subscribed.
    pub fn subscription_id(&self) -> Option<u64> {
        self.inner.lock().subscription_id
    }

    /// Event filter requested from the backend.
    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    /// Open the subscription and forward its events to `events`.
    ///
    /// A failed subscribe returns the adapter to `Unsubscribed`; there is no
    /// retry. If [`release`](Self::release) runs while the subscribe is in
    /// flight, the registration is dropped as soon as it arrives.
    pub async fn activate(&self, events: mpsc::Sender<ChangeEvent>) -> Result<()> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != SubscriptionState::Unsubscribed {
                return Err(Error::AlreadySubscribed);
            }
            inner.state = SubscriptionState::Subscribing;
            inner.generation += 1;
            inner.generation
        };

        let subscription = match self.client.subscribe(self.filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    inner.state = SubscriptionState::Unsubscribed;
                }
                warn!(error = %e, filter = %self.filter, "failed to subscribe to change feed");
                return Err(e.into());
            }
        };

        let subscription_id = subscription.id();
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            drop(inner);
            self.client.unsubscribe(subscription_id);
            debug!(subscription_id, "released before subscribe completed");
            return Ok(());
        }

        let state = self.inner.clone();
        let client = self.client.clone();
        let mut receiver = subscription.into_receiver();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if events.send(event).await.is_err() {
                    debug!(subscription_id, "event consumer gone");
                    break;
                }
            }

            let mut inner = state.lock();
            if inner.generation == generation {
                inner.state = SubscriptionState::Unsubscribed;
                inner.subscription_id = None;
                inner.forwarder = None;
                client.unsubscribe(subscription_id);
                info!(subscription_id, "change feed closed");
            }
        });

        inner.state = SubscriptionState::Subscribed;
        inner.subscription_id = Some(subscription_id);
        inner.forwarder = Some(forwarder);

        info!(
            subscription_id,
            table = %self.client.config().table,
            filter = %self.filter,
            "subscribed to change feed"
        );
        Ok(())
    }

    /// Release the subscription.
    ///
    /// Synchronous and idempotent; releasing an adapter that never
    /// subscribed, or whose subscribe failed, does nothing.
    pub fn release(&self) {
        let (subscription_id, forwarder) = {
            let mut inner = self.inner.lock();
            if inner.state == SubscriptionState::Unsubscribed && inner.forwarder.is_none() {
                return;
            }
            inner.generation += 1;
            inner.state = SubscriptionState::Unsubscribed;
            (inner.subscription_id.take(), inner.forwarder.take())
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        if let Some(subscription_id) = subscription_id {
            self.client.unsubscribe(subscription_id);
            info!(subscription_id, "change feed subscription released");
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
