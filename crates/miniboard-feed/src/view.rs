//! Feed view lifecycle.
//!
//! A [`FeedView`] is one mounted instance of the board: it owns a
//! [`FeedStore`], a [`ChangeSubscription`] and the consumer task that turns
//! delivered events into reloads or merges. Nothing is shared between
//! views.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use miniboard_client::{Backend, ClientConfig, PostsClient};
use miniboard_proto::{ChangeEvent, PostId};

use crate::error::Result;
use crate::layout::{Layout, ReloadPolicy};
use crate::store::{FeedSnapshot, FeedStore, Submitted};
use crate::subscription::{ChangeSubscription, SubscriptionState};

/// Options for [`FeedView::mount`].
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    /// Client configuration (table, timeout, channel capacity).
    pub config: ClientConfig,
    /// Display policy.
    pub layout: Layout,
    /// What to do with each delivered event.
    pub reload: ReloadPolicy,
}

impl FeedOptions {
    /// Default options over `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the reload policy.
    pub fn with_reload(mut self, reload: ReloadPolicy) -> Self {
        self.reload = reload;
        self
    }
}

/// A mounted board.
pub struct FeedView {
    store: Arc<FeedStore>,
    subscription: ChangeSubscription,
    consumer: Mutex<Option<JoinHandle<()>>>,
    reload: ReloadPolicy,
    mounted: AtomicBool,
}

impl FeedView {
    /// Mount a view: load every post, open the change feed and start
    /// reacting to events.
    ///
    /// A failed initial load leaves an empty board and a failed subscribe
    /// leaves a board without live updates; neither fails the mount.
    pub async fn mount(backend: Arc<dyn Backend>, options: FeedOptions) -> Self {
        let capacity = options.config.channel_capacity;
        let client = PostsClient::new(backend, options.config);
        let store = Arc::new(FeedStore::new(client.clone(), options.layout));
        let subscription = ChangeSubscription::new(client, options.layout.event_filter());

        store.refresh().await;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let consumer = tokio::spawn(consume(store.clone(), rx, options.reload));

        if let Err(e) = subscription.activate(tx).await {
            warn!(error = %e, "board mounted without live updates");
        }

        info!(
            layout = %options.layout,
            reload = %options.reload,
            posts = store.posts().len(),
            subscription = %subscription.state(),
            "feed view mounted"
        );

        Self {
            store,
            subscription,
            consumer: Mutex::new(Some(consumer)),
            reload: options.reload,
            mounted: AtomicBool::new(true),
        }
    }

    /// Tear the view down: detach the store, release the subscription and
    /// stop the consumer. Idempotent.
    ///
    /// The store is detached first, so no completion lands once unmount
    /// has started.
    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }

        self.store.detach();
        self.subscription.release();
        if let Some(consumer) = self.consumer.lock().take() {
            consumer.abort();
        }
        info!("feed view unmounted");
    }

    /// Whether the view is still mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Submit a post or reply. Insert failures are returned for the caller
    /// to show.
    pub async fn submit(
        &self,
        content: &str,
        author: Option<&str>,
        parent_id: Option<PostId>,
    ) -> Result<Submitted> {
        self.store.submit(content, author, parent_id).await
    }

    /// Like a post. Failures are logged and dropped.
    pub async fn like(&self, id: PostId, current_likes: u64) {
        if let Err(e) = self.store.like(id, current_likes).await {
            warn!(id, error = %e, "like failed");
        }
    }

    /// Delete a post. Failures are logged and dropped.
    pub async fn delete(&self, id: PostId) {
        if let Err(e) = self.store.delete(id).await {
            warn!(id, error = %e, "delete failed");
        }
    }

    /// Reload the board.
    pub async fn refresh(&self) {
        self.store.refresh().await;
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.store.snapshot()
    }

    /// A receiver notified whenever the snapshot changes.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.store.watch()
    }

    /// State of the change feed subscription.
    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    /// The display policy.
    pub fn layout(&self) -> Layout {
        self.store.layout()
    }

    /// The reload policy.
    pub fn reload_policy(&self) -> ReloadPolicy {
        self.reload
    }

    /// The underlying store.
    pub fn store(&self) -> &FeedStore {
        &self.store
    }
}

impl Drop for FeedView {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn consume(store: Arc<FeedStore>, mut events: mpsc::Receiver<ChangeEvent>, reload: ReloadPolicy) {
    while let Some(event) = events.recv().await {
        debug!(
            change_type = %event.change_type,
            subscription_id = event.subscription_id,
            "change event received"
        );
        match reload {
            ReloadPolicy::Full => store.refresh().await,
            ReloadPolicy::Incremental => {
                // Malformed events are logged by the store
                let _ = store.apply_event(&event);
            }
        }
    }
    debug!("event consumer stopped");
}
