//! Display and reload policies.

use std::fmt;
use std::str::FromStr;

use miniboard_proto::{EventFilter, Post, SortOrder};

use crate::thread::thread_order;

/// How the board lays out its posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Oldest first, replies nested under their parent.
    #[default]
    Threaded,
    /// Newest first, every post on its own line. Watches inserts only.
    Flat,
}

impl Layout {
    /// Order in which the full set is loaded.
    pub fn sort_order(&self) -> SortOrder {
        match self {
            Layout::Threaded => SortOrder::Ascending,
            Layout::Flat => SortOrder::Descending,
        }
    }

    /// Change types the layout reacts to.
    pub fn event_filter(&self) -> EventFilter {
        match self {
            Layout::Threaded => EventFilter::ALL,
            Layout::Flat => EventFilter::INSERT_ONLY,
        }
    }

    /// Display sequence for posts held in load order.
    pub fn display(&self, posts: &[Post]) -> Vec<Post> {
        match self {
            Layout::Threaded => thread_order(posts),
            Layout::Flat => posts.to_vec(),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Threaded => write!(f, "threaded"),
            Layout::Flat => write!(f, "flat"),
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "threaded" | "thread" => Ok(Layout::Threaded),
            "flat" => Ok(Layout::Flat),
            other => Err(format!("unknown layout: {other} (expected threaded or flat)")),
        }
    }
}

/// What the view does with each delivered change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Re-fetch the whole table.
    #[default]
    Full,
    /// Merge the event into the snapshot without fetching.
    Incremental,
}

impl fmt::Display for ReloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadPolicy::Full => write!(f, "full"),
            ReloadPolicy::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for ReloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ReloadPolicy::Full),
            "incremental" | "merge" => Ok(ReloadPolicy::Incremental),
            other => Err(format!(
                "unknown reload policy: {other} (expected full or incremental)"
            )),
        }
    }
}
