//! miniboard backend - an in-process posts service with a change feed.
//!
//! [`MemoryBackend`] implements [`miniboard_client::Backend`] entirely in
//! memory. Writes are committed to a [`PostsTable`], appended to the change
//! log and fanned out to subscribers by a background task, so change events
//! trail the write that caused them the way a hosted service's feed does.
//!
//! # Modules
//!
//! - [`table`] - Row storage, id and timestamp assignment
//! - [`changelog`] - Committed-change log and its processor task
//! - [`pubsub`] - Subscription registry and event fan-out
//! - [`faults`] - Injected failures and latency
//! - [`memory`] - The [`Backend`](miniboard_client::Backend) implementation

pub mod changelog;
pub mod faults;
pub mod memory;
pub mod pubsub;
pub mod table;

use std::sync::Arc;

use miniboard_client::{Backend, ClientConfig, Error};

pub use memory::MemoryBackend;
pub use pubsub::PubSubManager;
pub use table::PostsTable;

/// Open the backend named by `config.url`.
///
/// Only the in-process `local://` backend is built in. Must be called from
/// within a tokio runtime.
pub fn connect(config: &ClientConfig) -> Result<Arc<dyn Backend>, Error> {
    match config.scheme() {
        Some("local") => {
            tracing::info!(url = %config.url, table = %config.table, "using in-process backend");
            Ok(Arc::new(MemoryBackend::with_channel_capacity(
                config.channel_capacity,
            )))
        }
        Some(scheme) => Err(Error::Config(format!(
            "unsupported backend scheme: {scheme}"
        ))),
        None => Err(Error::Config(format!("invalid backend url: {}", config.url))),
    }
}
