//! Change-feed event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::post::{row_id, Post, PostId, Row};

/// Types of row changes delivered by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Insert => write!(f, "INSERT"),
            ChangeType::Update => write!(f, "UPDATE"),
            ChangeType::Delete => write!(f, "DELETE"),
        }
    }
}

/// Which change types a subscription wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    insert: bool,
    update: bool,
    delete: bool,
}

impl EventFilter {
    /// Every change type (`*`).
    pub const ALL: EventFilter = EventFilter {
        insert: true,
        update: true,
        delete: true,
    };

    /// Inserts only.
    pub const INSERT_ONLY: EventFilter = EventFilter {
        insert: true,
        update: false,
        delete: false,
    };

    /// Whether events of `change_type` pass this filter.
    pub fn matches(&self, change_type: ChangeType) -> bool {
        match change_type {
            ChangeType::Insert => self.insert,
            ChangeType::Update => self.update,
            ChangeType::Delete => self.delete,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return write!(f, "*");
        }
        let names: Vec<&str> = [
            (self.insert, "INSERT"),
            (self.update, "UPDATE"),
            (self.delete, "DELETE"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        write!(f, "{}", names.join(","))
    }
}

/// A row-level change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The subscription this event was delivered to.
    pub subscription_id: u64,
    /// Table the change happened in.
    pub table: String,
    /// The kind of change.
    pub change_type: ChangeType,
    /// Row after the change (inserts and updates).
    pub new: Option<Row>,
    /// Row before the change (at least the primary key for deletes).
    pub old: Option<Row>,
    /// When the backend committed the change.
    pub commit_timestamp: DateTime<Utc>,
}

/// A change event decoded into typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostChange {
    Inserted(Post),
    Updated(Post),
    Deleted(PostId),
}

impl PostChange {
    /// The id of the affected post.
    pub fn id(&self) -> PostId {
        match self {
            PostChange::Inserted(post) | PostChange::Updated(post) => post.id,
            PostChange::Deleted(id) => *id,
        }
    }
}

impl ChangeEvent {
    /// Decode the event payload into a typed change.
    pub fn decode(&self) -> Result<PostChange, Error> {
        match self.change_type {
            ChangeType::Insert | ChangeType::Update => {
                let row = self.new.clone().ok_or(Error::MissingColumn("new"))?;
                let post = Post::from_row(row)?;
                Ok(if self.change_type == ChangeType::Insert {
                    PostChange::Inserted(post)
                } else {
                    PostChange::Updated(post)
                })
            }
            ChangeType::Delete => {
                let row = self.old.as_ref().ok_or(Error::MissingColumn("old"))?;
                Ok(PostChange::Deleted(row_id(row)?))
            }
        }
    }
}
