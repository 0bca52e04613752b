//! The backend surface the board talks to.
//!
//! A [`Backend`] is a hosted relational service with a query surface
//! (select, insert, update, delete on a table) and a change-feed surface
//! (subscribe to row changes of a table). Rows are untyped here; decoding
//! happens in [`crate::PostsClient`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use miniboard_proto::{ChangeEvent, EventFilter, PostId, Row, SortOrder};

use crate::error::Error;

/// A backend reachable through its client library.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Select every row of `table`, ordered by `created_at`.
    async fn select_all(&self, table: &str, order: SortOrder) -> Result<Vec<Row>, Error>;

    /// Insert a row and return it as stored (with server-assigned columns).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, Error>;

    /// Overwrite the given columns of the row with `id`.
    async fn update(&self, table: &str, id: PostId, changes: Row) -> Result<(), Error>;

    /// Delete the row with `id`.
    async fn delete(&self, table: &str, id: PostId) -> Result<(), Error>;

    /// Register for change events on `table` passing `filter`.
    async fn subscribe(&self, table: &str, filter: EventFilter) -> Result<Subscription, Error>;

    /// Release a registration. Unknown ids are ignored.
    fn unsubscribe(&self, subscription_id: u64);
}

/// An open change-feed registration.
///
/// Events arrive on an mpsc channel; once the backend drops its sender
/// (after [`Backend::unsubscribe`] or shutdown) `recv` returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    table: String,
    filter: EventFilter,
    events: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Create a subscription handle.
    pub fn new(
        id: u64,
        table: impl Into<String>,
        filter: EventFilter,
        events: mpsc::Receiver<ChangeEvent>,
    ) -> Self {
        Self {
            id,
            table: table.into(),
            filter,
            events,
        }
    }

    /// Subscription identifier assigned by the backend.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Table being watched.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Change types being delivered.
    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    /// Receive the next event.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take the event receiver, e.g. to move it into a forwarding task.
    pub fn into_receiver(self) -> mpsc::Receiver<ChangeEvent> {
        self.events
    }
}
