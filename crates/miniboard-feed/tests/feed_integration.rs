//! Integration tests for the feed against the in-process backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use miniboard_backend::MemoryBackend;
use miniboard_client::{Backend, ClientConfig, Error as ClientError, PostsClient, Subscription};
use miniboard_feed::{
    thread_order, ChangeSubscription, FeedOptions, FeedSnapshot, FeedStore, FeedView, Layout,
    ReloadPolicy, SubscriptionState, Submitted,
};
use miniboard_proto::{EventFilter, Post, PostId, Row, SortOrder, POSTS_TABLE};

struct TestContext {
    backend: Arc<MemoryBackend>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    /// A backend whose subscriptions buffer only `capacity` events.
    fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            backend: Arc::new(MemoryBackend::with_channel_capacity(capacity)),
        }
    }

    fn client(&self) -> PostsClient {
        PostsClient::new(self.backend.clone(), ClientConfig::local())
    }

    fn store(&self, layout: Layout) -> Arc<FeedStore> {
        Arc::new(FeedStore::new(self.client(), layout))
    }

    async fn mount(&self, layout: Layout, reload: ReloadPolicy) -> FeedView {
        let options = FeedOptions::new(ClientConfig::local())
            .with_layout(layout)
            .with_reload(reload);
        FeedView::mount(self.backend.clone(), options).await
    }

    /// Insert directly through the client, bypassing any view.
    async fn post(&self, content: &str, parent_id: Option<PostId>) -> Post {
        let store = FeedStore::new(self.client(), Layout::Threaded);
        match store.submit(content, Some("seed"), parent_id).await.unwrap() {
            Submitted::Accepted(post) => post,
            Submitted::Skipped => panic!("seed content must not be blank"),
        }
    }
}

fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|p| p.id).collect()
}

async fn wait_until(view: &FeedView, mut done: impl FnMut(&FeedSnapshot) -> bool) -> FeedSnapshot {
    let mut rx = view.watch();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if done(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("store alive");
        }
    })
    .await
    .expect("condition reached in time")
}

#[tokio::test]
async fn test_submit_appears_after_reload() {
    let ctx = TestContext::new();
    let store = ctx.store(Layout::Threaded);

    let Submitted::Accepted(parent) = store.submit("top", None, None).await.unwrap() else {
        panic!("expected accepted post");
    };
    store.submit("reply", None, Some(parent.id)).await.unwrap();

    let posts = store.load_all().await.unwrap();
    assert_eq!(posts.len(), 2);

    let top: Vec<&Post> = posts.iter().filter(|p| p.content == "top").collect();
    let reply: Vec<&Post> = posts.iter().filter(|p| p.content == "reply").collect();
    assert_eq!(top.len(), 1);
    assert_eq!(reply.len(), 1);
    assert_eq!(top[0].parent_id, None);
    assert_eq!(reply[0].parent_id, Some(parent.id));
    assert!(posts.iter().all(|p| p.likes == 0));
}

#[tokio::test]
async fn test_blank_submit_is_a_noop() {
    let ctx = TestContext::new();
    let view = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;
    let requests = ctx.backend.request_count();
    let before = view.snapshot();

    for content in ["", "   ", "\n\t "] {
        assert_eq!(
            view.submit(content, Some("alice"), None).await.unwrap(),
            Submitted::Skipped
        );
    }

    assert_eq!(ctx.backend.request_count(), requests);
    assert_eq!(ctx.backend.row_count(POSTS_TABLE), 0);
    assert_eq!(view.snapshot(), before);
}

#[tokio::test]
async fn test_threaded_display_order() {
    let ctx = TestContext::new();
    let p1 = ctx.post("P1", None).await;
    let p2 = ctx.post("P2", None).await;
    let r1 = ctx.post("R1", Some(p1.id)).await;
    let r2 = ctx.post("R2", Some(p1.id)).await;

    let store = ctx.store(Layout::Threaded);
    let loaded = store.load_all().await.unwrap();
    assert_eq!(ids(&loaded), vec![p1.id, p2.id, r1.id, r2.id]);
    assert_eq!(ids(&store.display()), vec![p1.id, r1.id, r2.id, p2.id]);

    // Idempotent on its own output
    let display = store.display();
    assert_eq!(thread_order(&display), display);
}

#[tokio::test]
async fn test_reply_to_reply_not_displayed() {
    let ctx = TestContext::new();
    let top = ctx.post("top", None).await;
    let reply = ctx.post("reply", Some(top.id)).await;
    let nested = ctx.post("nested", Some(reply.id)).await;

    let store = ctx.store(Layout::Threaded);
    store.load_all().await.unwrap();

    assert!(store.posts().iter().any(|p| p.id == nested.id));
    assert_eq!(ids(&store.display()), vec![top.id, reply.id]);
}

#[tokio::test]
async fn test_concurrent_likes_lose_an_update() {
    let ctx = TestContext::new();
    let post = ctx.post("popular", None).await;
    let alice = ctx.store(Layout::Threaded);
    let bob = ctx.store(Layout::Threaded);

    // Both observed likes == 3 before either write landed
    let (a, b) = tokio::join!(alice.like(post.id, 3), bob.like(post.id, 3));
    a.unwrap();
    b.unwrap();

    assert_eq!(ctx.backend.get(POSTS_TABLE, post.id).unwrap().likes, 4);
}

#[tokio::test]
async fn test_deleted_parent_hides_replies() {
    let ctx = TestContext::new();
    let parent = ctx.post("parent", None).await;
    let other = ctx.post("other", None).await;
    let r1 = ctx.post("r1", Some(parent.id)).await;
    let r2 = ctx.post("r2", Some(parent.id)).await;

    let store = ctx.store(Layout::Threaded);
    store.delete(parent.id).await.unwrap();
    store.load_all().await.unwrap();

    let loaded = ids(&store.posts());
    assert!(loaded.contains(&r1.id));
    assert!(loaded.contains(&r2.id));
    assert_eq!(ids(&store.display()), vec![other.id]);
}

#[tokio::test]
async fn test_live_updates_reach_the_view() {
    let ctx = TestContext::new();
    let view = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;

    let parent = match view.submit("hello", Some("alice"), None).await.unwrap() {
        Submitted::Accepted(post) => post,
        Submitted::Skipped => panic!("expected accepted post"),
    };
    wait_until(&view, |s| s.display.len() == 1).await;

    view.submit("welcome", Some("bob"), Some(parent.id)).await.unwrap();
    view.like(parent.id, 0).await;
    let snapshot = wait_until(&view, |s| s.display.len() == 2 && s.display[0].likes == 1).await;

    assert_eq!(snapshot.display[0].id, parent.id);
    assert_eq!(snapshot.display[1].parent_id, Some(parent.id));
}

#[tokio::test]
async fn test_flat_layout_newest_first_inserts_only() {
    let ctx = TestContext::new();
    let view = ctx.mount(Layout::Flat, ReloadPolicy::Incremental).await;

    view.submit("first", None, None).await.unwrap();
    view.submit("second", None, None).await.unwrap();
    let snapshot = wait_until(&view, |s| s.display.len() == 2).await;
    assert_eq!(snapshot.display[0].content, "second");

    // Updates are not delivered to a flat board
    let first = snapshot.display[1].clone();
    view.like(first.id, first.likes).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(view.snapshot().display[1].likes, 0);
    assert_eq!(ctx.backend.get(POSTS_TABLE, first.id).unwrap().likes, 1);
}

#[tokio::test]
async fn test_in_flight_reload_after_unmount_is_discarded() {
    let ctx = TestContext::new();
    let view = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;
    let before = view.snapshot();

    ctx.backend.set_fetch_latency(Duration::from_millis(150));
    ctx.post("late", None).await;
    // Let the event reach the consumer and start its reload
    tokio::time::sleep(Duration::from_millis(30)).await;

    view.unmount();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(view.snapshot(), before);
    assert_eq!(view.subscription_state(), SubscriptionState::Unsubscribed);
    assert_eq!(ctx.backend.subscription_count(), 0);

    // Writes after unmount change nothing either
    ctx.backend.set_fetch_latency(Duration::ZERO);
    ctx.post("after", None).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(view.snapshot(), before);
}

#[tokio::test]
async fn test_load_completing_after_detach_is_discarded() {
    let ctx = TestContext::new();
    ctx.post("one", None).await;
    let store = ctx.store(Layout::Threaded);

    ctx.backend.set_fetch_latency(Duration::from_millis(100));
    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.load_all().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.detach();

    let fetched = pending.await.unwrap().unwrap();
    assert_eq!(fetched.len(), 1);
    assert!(store.posts().is_empty());
    assert_eq!(store.snapshot().revision, 0);
}

#[tokio::test]
async fn test_overlapping_older_load_is_discarded() {
    let ctx = TestContext::new();
    ctx.post("one", None).await;
    let store = ctx.store(Layout::Threaded);

    // The older load reads one row, then stalls
    ctx.backend.set_fetch_latency(Duration::from_millis(150));
    let older = tokio::spawn({
        let store = store.clone();
        async move { store.load_all().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    ctx.backend.set_fetch_latency(Duration::ZERO);
    ctx.post("two", None).await;
    let newer = store.load_all().await.unwrap();
    assert_eq!(newer.len(), 2);

    let stale = older.await.unwrap().unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(store.posts().len(), 2);
    assert_eq!(store.snapshot().revision, 1);
}

#[tokio::test]
async fn test_incremental_merge_matches_full_reload_with_duplicates() {
    let ctx = TestContext::new();
    ctx.backend.set_duplicate_delivery(true);
    let merged = ctx.mount(Layout::Threaded, ReloadPolicy::Incremental).await;
    let reloaded = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;

    let a = ctx.post("a", None).await;
    let b = ctx.post("b", None).await;
    ctx.post("a-reply", Some(a.id)).await;
    ctx.post("b-reply", Some(b.id)).await;
    merged.like(a.id, 0).await;
    merged.like(a.id, 1).await;
    merged.delete(b.id).await;

    let expected = {
        let store = ctx.store(Layout::Threaded);
        store.load_all().await.unwrap();
        store.display()
    };
    assert_eq!(ids(&expected).len(), 2);

    let snapshot = wait_until(&merged, |s| s.display == expected).await;
    assert_eq!(snapshot.display[0].likes, 2);
    wait_until(&reloaded, |s| s.display == expected).await;
}

#[tokio::test]
async fn test_incremental_merge_survives_burst_beyond_channel_capacity() {
    let ctx = TestContext::with_channel_capacity(4);
    let options = FeedOptions::new(ClientConfig::local().with_channel_capacity(4))
        .with_layout(Layout::Threaded)
        .with_reload(ReloadPolicy::Incremental);
    let merged = FeedView::mount(ctx.backend.clone(), options).await;

    let mut parent = None;
    for i in 0..300 {
        let post = ctx.post(&format!("post {i}"), if i % 3 == 0 { None } else { parent }).await;
        if i % 3 == 0 {
            parent = Some(post.id);
        }
    }

    let expected = {
        let store = ctx.store(Layout::Threaded);
        store.load_all().await.unwrap();
        store.display()
    };
    assert_eq!(expected.len(), 300);

    let snapshot = wait_until(&merged, |s| s.display.len() == expected.len()).await;
    assert_eq!(snapshot.display, expected);
    assert_eq!(ctx.backend.row_count(POSTS_TABLE), 300);
}

#[tokio::test]
async fn test_release_without_subscription_is_noop() {
    let ctx = TestContext::new();
    let subscription = ChangeSubscription::new(ctx.client(), EventFilter::ALL);

    subscription.release();
    subscription.release();
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
    assert_eq!(ctx.backend.subscription_count(), 0);
}

#[tokio::test]
async fn test_failed_insert_is_returned() {
    let ctx = TestContext::new();
    let view = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;

    ctx.backend.fail_next_insert();
    assert!(view.submit("lost", None, None).await.is_err());
    assert_eq!(ctx.backend.row_count(POSTS_TABLE), 0);
}

#[tokio::test]
async fn test_failed_initial_load_mounts_empty() {
    let ctx = TestContext::new();
    ctx.post("exists", None).await;
    ctx.backend.fail_next_fetch();

    let view = ctx.mount(Layout::Threaded, ReloadPolicy::Full).await;
    assert!(view.snapshot().display.is_empty());
    assert_eq!(view.subscription_state(), SubscriptionState::Subscribed);

    view.refresh().await;
    assert_eq!(view.snapshot().display.len(), 1);
}

/// Backend serving a fixed set of rows, some of them malformed.
struct FixedRows(Vec<Row>);

#[async_trait]
impl Backend for FixedRows {
    async fn select_all(&self, _table: &str, _order: SortOrder) -> Result<Vec<Row>, ClientError> {
        Ok(self.0.clone())
    }

    async fn insert(&self, _table: &str, _row: Row) -> Result<Row, ClientError> {
        Err(ClientError::Rejected("read only".into()))
    }

    async fn update(&self, _table: &str, _id: PostId, _changes: Row) -> Result<(), ClientError> {
        Err(ClientError::Rejected("read only".into()))
    }

    async fn delete(&self, _table: &str, _id: PostId) -> Result<(), ClientError> {
        Err(ClientError::Rejected("read only".into()))
    }

    async fn subscribe(&self, _table: &str, _filter: EventFilter) -> Result<Subscription, ClientError> {
        Err(ClientError::Connection("no change feed".into()))
    }

    fn unsubscribe(&self, _subscription_id: u64) {}
}

#[tokio::test]
async fn test_malformed_rows_are_rejected() {
    let rows: Vec<Row> = vec![
        json!({"id": 1, "content": "ok", "username": "a", "created_at": "2024-05-01T10:00:00Z", "parent_id": null, "likes": 0}),
        json!({"id": 2, "content": "no timestamp", "username": "a", "parent_id": null, "likes": 0}),
        json!({"id": 3, "content": "negative", "username": "a", "created_at": "2024-05-01T10:00:02Z", "parent_id": null, "likes": -1}),
        json!({"content": "no id", "created_at": "2024-05-01T10:00:03Z"}),
        json!({"id": 5, "content": "reply", "name": "b", "created_at": "2024-05-01T10:00:04Z", "parent_id": 1}),
    ]
    .into_iter()
    .filter_map(|v| v.as_object().cloned())
    .collect();

    let view = FeedView::mount(Arc::new(FixedRows(rows)), FeedOptions::default()).await;

    // A failed subscribe leaves the board static but loaded
    assert_eq!(view.subscription_state(), SubscriptionState::Unsubscribed);
    let snapshot = view.snapshot();
    assert_eq!(ids(&snapshot.posts), vec![1, 5]);
    assert_eq!(snapshot.display[1].username, "b");
}
