//! Change log processing.
//!
//! Every committed write is appended to the change log. A background task
//! drains the log and hands each entry to the [`PubSubManager`], so event
//! delivery trails the write that caused it. A slow subscriber stalls the
//! processor, and once the log buffer fills, writers wait in turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use miniboard_proto::{ChangeType, Row};

use crate::pubsub::PubSubManager;

/// One committed row change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    /// Log sequence number, assigned at commit.
    pub lsn: u64,
    /// Table the change happened in.
    pub table: String,
    /// The kind of change.
    pub change_type: ChangeType,
    /// Row after the change.
    pub new: Option<Row>,
    /// Row before the change.
    pub old: Option<Row>,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

/// Processor that bridges the change log to the pub-sub manager.
pub struct ChangeLogProcessor {
    rx: mpsc::Receiver<ChangeLogEntry>,
    pubsub: Arc<PubSubManager>,
}

impl ChangeLogProcessor {
    /// Create a new processor.
    pub fn new(rx: mpsc::Receiver<ChangeLogEntry>, pubsub: Arc<PubSubManager>) -> Self {
        Self { rx, pubsub }
    }

    /// Run until every sender is dropped.
    pub async fn run(mut self) {
        info!("change log processor started");

        while let Some(entry) = self.rx.recv().await {
            debug!(
                lsn = entry.lsn,
                table = %entry.table,
                change_type = %entry.change_type,
                "processing change log entry"
            );
            self.pubsub.publish(&entry).await;
        }

        info!("change log processor stopped (channel closed)");
    }
}

/// Sending side of the change log.
#[derive(Clone)]
pub struct ChangeLogHandle {
    tx: mpsc::Sender<ChangeLogEntry>,
}

impl ChangeLogHandle {
    /// Append an entry, waiting if the log buffer is full.
    pub async fn append(&self, entry: ChangeLogEntry) {
        if let Err(e) = self.tx.send(entry).await {
            tracing::warn!(lsn = e.0.lsn, "change log processor gone, dropping entry");
        }
    }
}

/// Start a processor task and return the handle used to append to the log.
pub fn start_processor(pubsub: Arc<PubSubManager>, buffer_size: usize) -> ChangeLogHandle {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let processor = ChangeLogProcessor::new(rx, pubsub);

    tokio::spawn(async move {
        processor.run().await;
    });

    ChangeLogHandle { tx }
}
