//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding rows and change events.
#[derive(Debug, Error)]
pub enum Error {
    /// A row is missing a required column.
    #[error("missing column: {0}")]
    MissingColumn(&'static str),

    /// A row could not be decoded into a typed record.
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// A row decoded but violates a record invariant.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedRow(err.to_string())
    }
}
