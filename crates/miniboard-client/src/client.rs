//! Typed client for the posts table.
//!
//! This module provides [`PostsClient`], which wraps a [`Backend`] and turns
//! its untyped rows into validated [`Post`] records.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use miniboard_proto::{decode_rows, EventFilter, NewPost, Post, PostId, Row, SortOrder};

use crate::backend::{Backend, Subscription};
use crate::config::ClientConfig;
use crate::error::Error;

/// A posts-table client bound to one backend.
///
/// # Example
///
/// ```ignore
/// use miniboard_client::{ClientConfig, PostsClient};
/// use miniboard_proto::{NewPost, SortOrder};
///
/// let client = PostsClient::new(backend, ClientConfig::local());
/// client.insert_post(&NewPost::new("hello")).await?;
/// let posts = client.fetch_posts(SortOrder::Descending).await?;
/// ```
#[derive(Clone)]
pub struct PostsClient {
    backend: Arc<dyn Backend>,
    config: ClientConfig,
}

impl PostsClient {
    /// Create a client over `backend`.
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        Self { backend, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch every post. Malformed rows are rejected and skipped.
    pub async fn fetch_posts(&self, order: SortOrder) -> Result<Vec<Post>, Error> {
        let rows = self
            .with_timeout(self.backend.select_all(&self.config.table, order))
            .await?;
        Ok(decode_rows(rows))
    }

    /// Insert a post and return it as stored.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, Error> {
        let row = self
            .with_timeout(self.backend.insert(&self.config.table, post.to_row()))
            .await?;
        Ok(Post::from_row(row)?)
    }

    /// Set the like counter of a post.
    pub async fn set_likes(&self, id: PostId, likes: u64) -> Result<(), Error> {
        let mut changes = Row::new();
        changes.insert("likes".into(), Value::from(likes));
        self.with_timeout(self.backend.update(&self.config.table, id, changes))
            .await
    }

    /// Delete a post.
    pub async fn delete_post(&self, id: PostId) -> Result<(), Error> {
        self.with_timeout(self.backend.delete(&self.config.table, id))
            .await
    }

    /// Subscribe to changes of the posts table.
    pub async fn subscribe(&self, filter: EventFilter) -> Result<Subscription, Error> {
        self.with_timeout(self.backend.subscribe(&self.config.table, filter))
            .await
    }

    /// Release a subscription.
    pub fn unsubscribe(&self, subscription_id: u64) {
        self.backend.unsubscribe(subscription_id);
    }

    async fn with_timeout<T>(
        &self,
        request: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    table = %self.config.table,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "backend request timed out"
                );
                Err(Error::Timeout)
            }
        }
    }
}
