//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A row or event could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] miniboard_proto::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,
}
