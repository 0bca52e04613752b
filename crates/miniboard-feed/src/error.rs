//! Feed error types.

use thiserror::Error;

/// Errors surfaced by the feed store and subscription adapter.
#[derive(Debug, Error)]
pub enum Error {
    /// A backend request failed.
    #[error(transparent)]
    Client(#[from] miniboard_client::Error),

    /// A change event could not be decoded.
    #[error("malformed change event: {0}")]
    MalformedEvent(#[from] miniboard_proto::Error),

    /// The store was detached from its view.
    #[error("feed detached")]
    Detached,

    /// The subscription is already open or opening.
    #[error("subscription already active")]
    AlreadySubscribed,
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, Error>;
