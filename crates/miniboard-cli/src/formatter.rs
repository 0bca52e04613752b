//! Board rendering.

use comfy_table::{Cell, Table};

use miniboard_feed::{FeedSnapshot, Layout};
use miniboard_proto::Post;

/// Timestamp format shown in the board.
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Render the display sequence as a table.
pub fn format_board(snapshot: &FeedSnapshot, layout: Layout) -> String {
    if snapshot.display.is_empty() {
        return "No posts yet. Type `post <text>` to start the board.".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["id", "author", "post", "likes", "posted"]);

    for post in &snapshot.display {
        table.add_row(vec![
            Cell::new(post.id),
            Cell::new(&post.username),
            Cell::new(content_cell(post, layout)),
            Cell::new(format!("♥ {}", post.likes)),
            Cell::new(post.created_at.format(TIME_FORMAT).to_string()),
        ]);
    }

    let hidden = snapshot.posts.len().saturating_sub(snapshot.display.len());
    if hidden > 0 {
        let noun = if hidden == 1 { "reply" } else { "replies" };
        format!("{table}\n({hidden} nested or orphaned {noun} not shown)")
    } else {
        table.to_string()
    }
}

fn content_cell(post: &Post, layout: Layout) -> String {
    match (layout, post.parent_id) {
        (Layout::Threaded, Some(_)) => format!("  ↳ {}", post.content),
        (Layout::Flat, Some(parent_id)) => format!("(re #{parent_id}) {}", post.content),
        (_, None) => post.content.clone(),
    }
}

/// Format a message the user must acknowledge.
pub fn format_alert(message: &str) -> String {
    format!("!! {message}")
}
