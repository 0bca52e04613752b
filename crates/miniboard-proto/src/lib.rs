//! miniboard protocol types.
//!
//! This crate defines the records exchanged between the board client and
//! its backend: the typed [`Post`] and its untyped [`Row`] form, and the
//! change-feed [`ChangeEvent`] with its [`EventFilter`].
//!
//! # Modules
//!
//! - [`post`] - Post record, insert payload, row validation
//! - [`change`] - Change types, filters and events
//! - [`query`] - Sort order for table selects
//! - [`error`] - Decoding error types

pub mod change;
pub mod error;
pub mod post;
pub mod query;

pub use change::{ChangeEvent, ChangeType, EventFilter, PostChange};
pub use error::Error;
pub use post::{row_id, NewPost, Post, PostId, Row, ANONYMOUS_AUTHOR};
pub use query::SortOrder;

/// Name of the table holding posts.
pub const POSTS_TABLE: &str = "posts";

/// Decode a batch of rows, rejecting malformed ones.
///
/// Rejected rows are logged and skipped; the remaining posts keep their
/// relative order.
pub fn decode_rows(rows: Vec<Row>) -> Vec<Post> {
    rows.into_iter()
        .filter_map(|row| match Post::from_row(row) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!(error = %e, "rejecting malformed post row");
                None
            }
        })
        .collect()
}
