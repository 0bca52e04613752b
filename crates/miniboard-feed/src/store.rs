//! The feed store.
//!
//! [`FeedStore`] owns the local snapshot of every post and the display
//! sequence derived from it. The snapshot is only ever replaced by a load
//! completion or an event merge, and each of those carries a ticket taken
//! from one monotonically increasing counter. A completion whose ticket is
//! not newer than the last applied one is discarded, so when two loads
//! overlap the one issued last wins regardless of which response arrives
//! first.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use miniboard_client::PostsClient;
use miniboard_proto::{ChangeEvent, NewPost, Post, PostChange, PostId, SortOrder};

use crate::error::{Error, Result};
use crate::layout::Layout;

/// The posts currently known to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    /// Posts in load order.
    pub posts: Vec<Post>,
    /// Posts in display order.
    pub display: Vec<Post>,
    /// Incremented every time the snapshot is replaced.
    pub revision: u64,
}

/// Outcome of [`FeedStore::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// The content was blank; nothing was sent.
    Skipped,
    /// The backend stored the post.
    Accepted(Post),
}

#[derive(Debug, Default)]
struct State {
    posts: Vec<Post>,
    applied_ticket: u64,
    deleted: HashSet<PostId>,
    detached: bool,
}

/// Local snapshot of the board.
pub struct FeedStore {
    client: PostsClient,
    layout: Layout,
    next_ticket: AtomicU64,
    state: Mutex<State>,
    snapshot: watch::Sender<FeedSnapshot>,
}

impl FeedStore {
    /// Create an empty store.
    pub fn new(client: PostsClient, layout: Layout) -> Self {
        let (snapshot, _) = watch::channel(FeedSnapshot::default());
        Self {
            client,
            layout,
            next_ticket: AtomicU64::new(0),
            state: Mutex::new(State::default()),
            snapshot,
        }
    }

    /// The display policy.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The underlying posts client.
    pub fn client(&self) -> &PostsClient {
        &self.client
    }

    /// Fetch every post and replace the snapshot with it.
    ///
    /// Returns the fetched posts in load order. On failure the snapshot is
    /// left as it was. A completion that lost the race to a newer load, or
    /// that arrives after [`detach`](Self::detach), is discarded.
    pub async fn load_all(&self) -> Result<Vec<Post>> {
        if self.is_detached() {
            return Err(Error::Detached);
        }

        let ticket = self.issue_ticket();
        let posts = match self.client.fetch_posts(self.layout.sort_order()).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(ticket, error = %e, "failed to load posts, keeping current snapshot");
                return Err(e.into());
            }
        };

        let mut state = self.state.lock();
        if self.accept(&mut state, ticket, "load") {
            state.posts = posts.clone();
            self.publish(&state);
            debug!(ticket, count = posts.len(), "snapshot replaced");
        }
        Ok(posts)
    }

    /// Reload, logging and swallowing failures.
    pub async fn refresh(&self) {
        match self.load_all().await {
            Ok(_) => {}
            Err(Error::Detached) => debug!("refresh skipped, store detached"),
            Err(_) => {} // already logged by load_all
        }
    }

    /// Merge one change event into the snapshot without fetching.
    ///
    /// Returns whether the snapshot changed. Inserts and updates upsert by
    /// id, deletes remove by id. Events for an id already seen deleted are
    /// ignored, and an update never lowers a known like count, so duplicate
    /// and reordered deliveries converge.
    pub fn apply_event(&self, event: &ChangeEvent) -> Result<bool> {
        let change = match event.decode() {
            Ok(change) => change,
            Err(e) => {
                warn!(
                    subscription_id = event.subscription_id,
                    change_type = %event.change_type,
                    error = %e,
                    "rejecting malformed change event"
                );
                return Err(e.into());
            }
        };

        let mut state = self.state.lock();
        let ticket = self.issue_ticket();
        if !self.accept(&mut state, ticket, "event") {
            return Err(Error::Detached);
        }

        let changed = match change {
            PostChange::Inserted(post) | PostChange::Updated(post) => {
                if state.deleted.contains(&post.id) {
                    debug!(id = post.id, "ignoring change for deleted post");
                    false
                } else {
                    upsert(&mut state.posts, post, self.layout.sort_order())
                }
            }
            PostChange::Deleted(id) => {
                state.deleted.insert(id);
                let before = state.posts.len();
                state.posts.retain(|p| p.id != id);
                state.posts.len() != before
            }
        };

        if changed {
            self.publish(&state);
        }
        Ok(changed)
    }

    /// Submit a new post or reply.
    ///
    /// Blank content is skipped without contacting the backend. The post
    /// is not added locally; it shows up once the change feed reports it.
    pub async fn submit(
        &self,
        content: &str,
        author: Option<&str>,
        parent_id: Option<PostId>,
    ) -> Result<Submitted> {
        let post = NewPost::new(content)
            .with_author(author)
            .with_parent(parent_id);
        if post.is_blank() {
            debug!("blank submission skipped");
            return Ok(Submitted::Skipped);
        }

        match self.client.insert_post(&post).await {
            Ok(stored) => {
                info!(id = stored.id, parent_id = ?stored.parent_id, "post submitted");
                Ok(Submitted::Accepted(stored))
            }
            Err(e) => {
                warn!(error = %e, parent_id = ?parent_id, "failed to submit post");
                Err(e.into())
            }
        }
    }

    /// Like a post: set its counter to `current_likes + 1`.
    ///
    /// The counter is not re-read, so two likes issued from the same
    /// observed value store the same result.
    pub async fn like(&self, id: PostId, current_likes: u64) -> Result<()> {
        let likes = current_likes.saturating_add(1);
        self.client.set_likes(id, likes).await?;
        debug!(id, likes, "post liked");
        Ok(())
    }

    /// Delete a post. Replies are left in place.
    pub async fn delete(&self, id: PostId) -> Result<()> {
        self.client.delete_post(id).await?;
        debug!(id, "post deleted");
        Ok(())
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Posts in load order.
    pub fn posts(&self) -> Vec<Post> {
        self.snapshot.borrow().posts.clone()
    }

    /// Posts in display order.
    pub fn display(&self) -> Vec<Post> {
        self.snapshot.borrow().display.clone()
    }

    /// A receiver notified whenever the snapshot is replaced.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.subscribe()
    }

    /// Stop accepting load completions and event merges.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        if !state.detached {
            state.detached = true;
            debug!(applied_ticket = state.applied_ticket, "store detached");
        }
    }

    /// Whether [`detach`](Self::detach) was called.
    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    fn issue_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn accept(&self, state: &mut State, ticket: u64, source: &'static str) -> bool {
        if state.detached {
            debug!(ticket, source, "store detached, discarding completion");
            return false;
        }
        if ticket <= state.applied_ticket {
            debug!(
                ticket,
                applied_ticket = state.applied_ticket,
                source,
                "discarding stale completion"
            );
            return false;
        }
        state.applied_ticket = ticket;
        true
    }

    fn publish(&self, state: &State) {
        let display = self.layout.display(&state.posts);
        let posts = state.posts.clone();
        self.snapshot.send_modify(|snapshot| {
            snapshot.posts = posts;
            snapshot.display = display;
            snapshot.revision += 1;
        });
    }
}

/// Insert or merge `post`, keeping `posts` sorted by `created_at`.
fn upsert(posts: &mut Vec<Post>, mut post: Post, order: SortOrder) -> bool {
    if let Some(existing) = posts.iter_mut().find(|p| p.id == post.id) {
        post.likes = post.likes.max(existing.likes);
        if *existing == post {
            return false;
        }
        *existing = post;
        return true;
    }

    posts.push(post);
    posts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    if !order.is_ascending() {
        posts.reverse();
    }
    true
}
