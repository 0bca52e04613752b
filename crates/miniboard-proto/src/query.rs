//! Query shapes for the posts table.

use serde::{Deserialize, Serialize};

/// Sort direction on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

impl SortOrder {
    /// Whether rows are returned oldest first.
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Ascending)
    }
}
