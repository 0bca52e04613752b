//! Posts table storage.
//!
//! Rows are kept in memory keyed by id. The table assigns ids from a
//! sequence starting at 1 and stamps `created_at` from a clock that never
//! repeats or goes backwards, so `created_at` order equals insert order.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use miniboard_client::Error;
use miniboard_proto::{Post, PostId, Row, SortOrder};

/// Columns the backend assigns and never lets clients write.
const SERVER_COLUMNS: [&str; 2] = ["id", "created_at"];

/// An in-memory posts table.
#[derive(Debug)]
pub struct PostsTable {
    rows: BTreeMap<PostId, Post>,
    next_id: PostId,
    last_created_at: Option<DateTime<Utc>>,
}

impl PostsTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            last_created_at: None,
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a row by id.
    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.rows.get(&id)
    }

    /// All rows ordered by `created_at`.
    pub fn select_all(&self, order: SortOrder) -> Vec<Post> {
        let mut posts: Vec<Post> = self.rows.values().cloned().collect();
        posts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if !order.is_ascending() {
            posts.reverse();
        }
        posts
    }

    /// Insert a row, assigning `id` and `created_at`.
    pub fn insert(&mut self, row: Row) -> Result<Post, Error> {
        reject_server_columns(&row)?;

        let mut row = row;
        row.insert("id".into(), Value::from(self.next_id));
        row.insert("created_at".into(), Value::from(self.tick().to_rfc3339()));

        let post = Post::from_row(row).map_err(|e| Error::Rejected(e.to_string()))?;
        self.next_id += 1;
        self.rows.insert(post.id, post.clone());
        Ok(post)
    }

    /// Apply column changes to the row with `id`.
    ///
    /// Returns the rows before and after, or `None` when no row matched.
    pub fn update(&mut self, id: PostId, changes: Row) -> Result<Option<(Post, Post)>, Error> {
        reject_server_columns(&changes)?;

        let Some(current) = self.rows.get(&id) else {
            return Ok(None);
        };

        let mut row = current.to_row();
        row.extend(changes);
        let updated = Post::from_row(row).map_err(|e| Error::Rejected(e.to_string()))?;

        let before = self.rows.insert(id, updated.clone());
        Ok(before.map(|before| (before, updated)))
    }

    /// Remove the row with `id`, returning it when it existed.
    pub fn delete(&mut self, id: PostId) -> Option<Post> {
        self.rows.remove(&id)
    }

    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created_at {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }
}

impl Default for PostsTable {
    fn default() -> Self {
        Self::new()
    }
}

fn reject_server_columns(row: &Row) -> Result<(), Error> {
    for column in SERVER_COLUMNS {
        if row.contains_key(column) {
            return Err(Error::Rejected(format!(
                "column {column} is assigned by the server"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniboard_proto::NewPost;
    use serde_json::json;

    #[test]
    fn test_insert_assigns_ids_and_timestamps() {
        let mut table = PostsTable::new();
        let first = table.insert(NewPost::new("one").to_row()).unwrap();
        let second = table.insert(NewPost::new("two").to_row()).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.created_at > first.created_at);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_select_order() {
        let mut table = PostsTable::new();
        for content in ["a", "b", "c"] {
            table.insert(NewPost::new(content).to_row()).unwrap();
        }

        let asc: Vec<PostId> = table.select_all(SortOrder::Ascending).iter().map(|p| p.id).collect();
        let desc: Vec<PostId> = table.select_all(SortOrder::Descending).iter().map(|p| p.id).collect();
        assert_eq!(asc, vec![1, 2, 3]);
        assert_eq!(desc, vec![3, 2, 1]);
    }

    #[test]
    fn test_insert_rejects_client_ids() {
        let mut table = PostsTable::new();
        let mut row = NewPost::new("x").to_row();
        row.insert("id".into(), json!(99));
        assert!(matches!(table.insert(row), Err(Error::Rejected(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_rejects_blank_content() {
        let mut table = PostsTable::new();
        assert!(table.insert(NewPost::new("  ").to_row()).is_err());
        // The sequence is not consumed by a rejected insert
        assert_eq!(table.insert(NewPost::new("ok").to_row()).unwrap().id, 1);
    }

    #[test]
    fn test_update_likes() {
        let mut table = PostsTable::new();
        let post = table.insert(NewPost::new("x").to_row()).unwrap();

        let mut changes = Row::new();
        changes.insert("likes".into(), json!(4));
        let (before, after) = table.update(post.id, changes).unwrap().unwrap();

        assert_eq!(before.likes, 0);
        assert_eq!(after.likes, 4);
        assert_eq!(after.created_at, post.created_at);
        assert_eq!(table.get(post.id).unwrap().likes, 4);
    }

    #[test]
    fn test_update_missing_row_is_noop() {
        let mut table = PostsTable::new();
        let mut changes = Row::new();
        changes.insert("likes".into(), json!(1));
        assert!(table.update(5, changes).unwrap().is_none());
    }

    #[test]
    fn test_delete_keeps_replies() {
        let mut table = PostsTable::new();
        let parent = table.insert(NewPost::new("parent").to_row()).unwrap();
        let reply = table
            .insert(NewPost::new("reply").with_parent(Some(parent.id)).to_row())
            .unwrap();

        assert!(table.delete(parent.id).is_some());
        assert!(table.delete(parent.id).is_none());
        assert_eq!(table.get(reply.id).unwrap().parent_id, Some(parent.id));
    }
}
