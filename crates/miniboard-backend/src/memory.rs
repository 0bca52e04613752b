//! In-process implementation of [`Backend`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use miniboard_client::config::DEFAULT_CHANNEL_CAPACITY;
use miniboard_client::{Backend, Error, Subscription};
use miniboard_proto::{ChangeType, EventFilter, Post, PostId, Row, SortOrder};

use crate::changelog::{start_processor, ChangeLogEntry, ChangeLogHandle};
use crate::faults::{FaultPlan, RequestKind};
use crate::pubsub::PubSubManager;
use crate::table::PostsTable;

/// Buffer size of the change log between writers and the processor.
const CHANGE_LOG_BUFFER: usize = 1024;

/// A backend living in the current process.
///
/// Writes are committed to in-memory tables and appended to a change log;
/// a background task fans the log out to subscribers. Must be created from
/// within a tokio runtime.
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, PostsTable>>,
    pubsub: Arc<PubSubManager>,
    changelog: ChangeLogHandle,
    faults: Mutex<FaultPlan>,
    next_lsn: AtomicU64,
    requests: AtomicU64,
    channel_capacity: usize,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty backend whose subscriptions buffer `capacity` events.
    pub fn with_channel_capacity(capacity: usize) -> Self {
        let pubsub = Arc::new(PubSubManager::new());
        let changelog = start_processor(pubsub.clone(), CHANGE_LOG_BUFFER);

        Self {
            tables: Mutex::new(HashMap::new()),
            pubsub,
            changelog,
            faults: Mutex::new(FaultPlan::default()),
            next_lsn: AtomicU64::new(1),
            requests: AtomicU64::new(0),
            channel_capacity: capacity.max(1),
        }
    }

    /// Fail the next select.
    pub fn fail_next_fetch(&self) {
        self.faults.lock().fail_fetches += 1;
    }

    /// Fail the next insert.
    pub fn fail_next_insert(&self) {
        self.faults.lock().fail_inserts += 1;
    }

    /// Fail the next update.
    pub fn fail_next_update(&self) {
        self.faults.lock().fail_updates += 1;
    }

    /// Fail the next delete.
    pub fn fail_next_delete(&self) {
        self.faults.lock().fail_deletes += 1;
    }

    /// Delay select responses. Rows are read before the delay elapses, so a
    /// slow response carries the data as of when it was issued.
    pub fn set_fetch_latency(&self, latency: Duration) {
        self.faults.lock().fetch_latency = latency;
    }

    /// Deliver every change event twice.
    pub fn set_duplicate_delivery(&self, enabled: bool) {
        self.pubsub.set_duplicate_delivery(enabled);
    }

    /// Total query-surface requests received (select, insert, update, delete).
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.pubsub.subscription_count()
    }

    /// Read a stored post directly.
    pub fn get(&self, table: &str, id: PostId) -> Option<Post> {
        self.tables.lock().get(table).and_then(|t| t.get(id).cloned())
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, PostsTable::len)
    }

    fn begin(&self, kind: RequestKind) -> Result<(), Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.faults.lock().take(kind)
    }

    fn entry(
        &self,
        table: &str,
        change_type: ChangeType,
        new: Option<Row>,
        old: Option<Row>,
    ) -> ChangeLogEntry {
        ChangeLogEntry {
            lsn: self.next_lsn.fetch_add(1, Ordering::SeqCst),
            table: table.to_string(),
            change_type,
            new,
            old,
            timestamp: Utc::now(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_all(&self, table: &str, order: SortOrder) -> Result<Vec<Row>, Error> {
        self.begin(RequestKind::Fetch)?;

        let rows: Vec<Row> = self
            .tables
            .lock()
            .get(table)
            .map(|t| t.select_all(order).iter().map(Post::to_row).collect())
            .unwrap_or_default();

        let latency = self.faults.lock().fetch_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        tracing::trace!(table, rows = rows.len(), "select");
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, Error> {
        self.begin(RequestKind::Insert)?;

        let (post, entry) = {
            let mut tables = self.tables.lock();
            let post = tables.entry(table.to_string()).or_default().insert(row)?;
            let entry = self.entry(table, ChangeType::Insert, Some(post.to_row()), None);
            (post, entry)
        };

        tracing::debug!(table, id = post.id, parent_id = ?post.parent_id, "row inserted");
        self.changelog.append(entry).await;
        Ok(post.to_row())
    }

    async fn update(&self, table: &str, id: PostId, changes: Row) -> Result<(), Error> {
        self.begin(RequestKind::Update)?;

        let entry = {
            let mut tables = self.tables.lock();
            let Some(t) = tables.get_mut(table) else {
                return Ok(());
            };
            match t.update(id, changes)? {
                Some((before, after)) => Some(self.entry(
                    table,
                    ChangeType::Update,
                    Some(after.to_row()),
                    Some(before.to_row()),
                )),
                None => None,
            }
        };

        match entry {
            Some(entry) => {
                tracing::debug!(table, id, "row updated");
                self.changelog.append(entry).await;
            }
            None => tracing::debug!(table, id, "update matched no row"),
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: PostId) -> Result<(), Error> {
        self.begin(RequestKind::Delete)?;

        let entry = {
            let mut tables = self.tables.lock();
            tables.get_mut(table).and_then(|t| t.delete(id)).map(|_| {
                let mut old = Row::new();
                old.insert("id".into(), Value::from(id));
                self.entry(table, ChangeType::Delete, None, Some(old))
            })
        };

        match entry {
            Some(entry) => {
                tracing::debug!(table, id, "row deleted");
                self.changelog.append(entry).await;
            }
            None => tracing::debug!(table, id, "delete matched no row"),
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str, filter: EventFilter) -> Result<Subscription, Error> {
        Ok(self.pubsub.subscribe(table, filter, self.channel_capacity))
    }

    fn unsubscribe(&self, subscription_id: u64) {
        self.pubsub.unsubscribe(subscription_id);
    }
}
