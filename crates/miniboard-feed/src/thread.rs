//! Parent-then-replies linearization.

use std::collections::HashMap;

use miniboard_proto::{Post, PostId};

/// Linearize posts into threaded display order.
///
/// Each top-level post is emitted in input order, followed by its direct
/// replies sorted by `created_at` (ties broken by `id`). Replies to replies
/// and replies whose parent is absent are not emitted.
pub fn thread_order(posts: &[Post]) -> Vec<Post> {
    let mut replies: HashMap<PostId, Vec<&Post>> = HashMap::new();
    for post in posts {
        if let Some(parent_id) = post.parent_id {
            replies.entry(parent_id).or_default().push(post);
        }
    }
    for siblings in replies.values_mut() {
        siblings.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    }

    let mut ordered = Vec::with_capacity(posts.len());
    for post in posts.iter().filter(|p| p.is_top_level()) {
        ordered.push(post.clone());
        if let Some(siblings) = replies.get(&post.id) {
            ordered.extend(siblings.iter().map(|reply| (*reply).clone()));
        }
    }
    ordered
}
