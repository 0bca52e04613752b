//! The post record and its row encoding.
//!
//! Rows travel between the client and the backend as loosely-typed JSON
//! objects. [`Post::from_row`] is the only way a row becomes a [`Post`]; it
//! rejects anything that does not satisfy the record invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Label used when a post is submitted without an author name.
pub const ANONYMOUS_AUTHOR: &str = "匿名ユーザー";

/// Backend-assigned post identifier.
pub type PostId = i64;

/// An untyped row as delivered by the backend.
pub type Row = Map<String, Value>;

/// A validated post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<PostId>,
    pub likes: u64,
}

/// Wire shape accepted from the backend before validation.
#[derive(Deserialize)]
struct RawPost {
    id: PostId,
    content: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    parent_id: Option<PostId>,
    #[serde(default)]
    likes: Option<i64>,
}

impl Post {
    /// Decode and validate a backend row.
    pub fn from_row(row: Row) -> Result<Self, Error> {
        if !row.contains_key("id") {
            return Err(Error::MissingColumn("id"));
        }
        let raw: RawPost = serde_json::from_value(Value::Object(row))?;

        if raw.content.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "post {} has empty content",
                raw.id
            )));
        }
        let likes = match raw.likes {
            None => 0,
            Some(n) if n >= 0 => n as u64,
            Some(n) => {
                return Err(Error::InvalidRecord(format!(
                    "post {} has negative likes ({n})",
                    raw.id
                )))
            }
        };
        if raw.parent_id == Some(raw.id) {
            return Err(Error::InvalidRecord(format!(
                "post {} is its own parent",
                raw.id
            )));
        }

        // First non-blank of the accepted author columns
        let author = [&raw.username, &raw.name, &raw.author_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|name| !name.trim().is_empty());

        Ok(Self {
            id: raw.id,
            content: raw.content,
            username: author_or_anonymous(author),
            created_at: raw.created_at,
            parent_id: raw.parent_id,
            likes,
        })
    }

    /// Encode this post as a backend row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("content".into(), Value::from(self.content.clone()));
        row.insert("username".into(), Value::from(self.username.clone()));
        row.insert(
            "created_at".into(),
            Value::from(self.created_at.to_rfc3339()),
        );
        row.insert(
            "parent_id".into(),
            self.parent_id.map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("likes".into(), Value::from(self.likes));
        row
    }

    /// Whether this post is a top-level post.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Extract the `id` column from a row without decoding the rest.
///
/// Delete events may only carry the primary key of the removed row.
pub fn row_id(row: &Row) -> Result<PostId, Error> {
    match row.get("id") {
        None | Some(Value::Null) => Err(Error::MissingColumn("id")),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| Error::MalformedRow(format!("id is not an integer: {value}"))),
    }
}

/// A post about to be inserted. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    pub username: String,
    pub parent_id: Option<PostId>,
    pub likes: u64,
}

impl NewPost {
    /// Create a top-level post by the anonymous author.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            username: ANONYMOUS_AUTHOR.to_string(),
            parent_id: None,
            likes: 0,
        }
    }

    /// Set the author. Blank names fall back to the anonymous label.
    pub fn with_author(mut self, author: Option<&str>) -> Self {
        self.username = author_or_anonymous(author);
        self
    }

    /// Set the parent post, turning this into a reply.
    pub fn with_parent(mut self, parent_id: Option<PostId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Whether the content is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Encode as an insert row (without server-assigned columns).
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("content".into(), Value::from(self.content.clone()));
        row.insert("username".into(), Value::from(self.username.clone()));
        row.insert(
            "parent_id".into(),
            self.parent_id.map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("likes".into(), Value::from(self.likes));
        row
    }
}

fn author_or_anonymous(author: Option<&str>) -> String {
    match author.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ANONYMOUS_AUTHOR.to_string(),
    }
}
