//! Board command parsing and execution.

use miniboard_feed::{FeedView, Submitted};
use miniboard_proto::PostId;

use crate::formatter;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post(String),
    Reply(PostId, String),
    Like(PostId),
    Delete(PostId),
    Name(Option<String>),
    Show,
    Refresh,
    Help,
    Quit,
}

/// Result of executing a command.
pub enum CommandResult {
    /// Continue the loop.
    Continue,
    /// Exit the loop.
    Exit,
    /// Output to display.
    Output(String),
    /// A failure the user must see.
    Alert(String),
    /// Change the display name.
    SetName(Option<String>),
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_lowercase().as_str() {
        "post" | "p" => Ok(Command::Post(rest.to_string())),
        "reply" | "r" => {
            let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Ok(Command::Reply(parse_id(id, "reply <id> <text>")?, text.trim().to_string()))
        }
        "like" | "l" => Ok(Command::Like(parse_id(rest, "like <id>")?)),
        "delete" | "del" | "d" => Ok(Command::Delete(parse_id(rest, "delete <id>")?)),
        "name" => Ok(Command::Name((!rest.is_empty()).then(|| rest.to_string()))),
        "show" | "ls" => Ok(Command::Show),
        "refresh" => Ok(Command::Refresh),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command: {other}. Type `help` for commands.")),
    }
}

fn parse_id(arg: &str, usage: &str) -> Result<PostId, String> {
    arg.trim()
        .parse()
        .map_err(|_| format!("Usage: {usage}"))
}

/// Execute a command against the mounted board.
pub async fn execute(command: Command, view: &FeedView, name: Option<&str>) -> CommandResult {
    match command {
        Command::Quit => CommandResult::Exit,
        Command::Help => CommandResult::Output(get_help()),
        Command::Show => CommandResult::Output(formatter::format_board(
            &view.snapshot(),
            view.layout(),
        )),
        Command::Refresh => {
            view.refresh().await;
            CommandResult::Output(formatter::format_board(&view.snapshot(), view.layout()))
        }
        Command::Name(name) => CommandResult::SetName(name),

        Command::Post(text) => submit(view, &text, name, None).await,
        Command::Reply(parent_id, text) => {
            let snapshot = view.snapshot();
            match snapshot.posts.iter().find(|p| p.id == parent_id) {
                Some(parent) if parent.is_top_level() => {
                    submit(view, &text, name, Some(parent_id)).await
                }
                Some(_) => CommandResult::Output(format!(
                    "Post {parent_id} is a reply; reply to its thread instead"
                )),
                None => CommandResult::Output(format!("No post with id {parent_id}")),
            }
        }

        Command::Like(id) => {
            let snapshot = view.snapshot();
            match snapshot.posts.iter().find(|p| p.id == id) {
                Some(post) => {
                    view.like(id, post.likes).await;
                    CommandResult::Continue
                }
                None => CommandResult::Output(format!("No post with id {id}")),
            }
        }

        Command::Delete(id) => {
            view.delete(id).await;
            CommandResult::Continue
        }
    }
}

async fn submit(
    view: &FeedView,
    text: &str,
    name: Option<&str>,
    parent_id: Option<PostId>,
) -> CommandResult {
    match view.submit(text, name, parent_id).await {
        Ok(Submitted::Accepted(_)) | Ok(Submitted::Skipped) => CommandResult::Continue,
        Err(e) => CommandResult::Alert(format!("Could not post: {e}")),
    }
}

/// Get help text for board commands.
pub fn get_help() -> String {
    r#"Board Commands
==============

post <text>           Post a new message
reply <id> <text>     Reply to a top-level post
like <id>             Like a post
delete <id>           Delete a post (replies stay, but are hidden)
name [name]           Set or clear your display name
show                  Show the board
refresh               Reload the board from the backend
help                  Show this help message
quit / exit           Leave the board
"#
    .to_string()
}
