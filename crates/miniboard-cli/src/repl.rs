//! Interactive board loop.
//!
//! Reads commands from stdin while redrawing the board on every snapshot
//! change, so posts from other clients show up without typing anything.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use miniboard_feed::FeedView;

use crate::commands::{self, CommandResult};
use crate::formatter;

fn prompt(name: Option<&str>) {
    print!("{}> ", name.unwrap_or("miniboard"));
    let _ = std::io::stdout().flush();
}

/// Run the board until `quit` or end of input.
pub async fn run(
    view: &FeedView,
    initial_name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut name = initial_name;
    let mut updates = view.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "miniboard ({} layout, {} reload) - type `help` for commands\n",
        view.layout(),
        view.reload_policy()
    );
    println!("{}", formatter::format_board(&updates.borrow_and_update(), view.layout()));
    prompt(name.as_deref());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = formatter::format_board(&updates.borrow_and_update(), view.layout());
                println!("\n{board}");
                prompt(name.as_deref());
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!();
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    prompt(name.as_deref());
                    continue;
                }

                let result = match commands::parse(line) {
                    Ok(command) => commands::execute(command, view, name.as_deref()).await,
                    Err(message) => CommandResult::Output(message),
                };
                match result {
                    CommandResult::Continue => {}
                    CommandResult::Exit => {
                        println!("Goodbye!");
                        break;
                    }
                    CommandResult::Output(msg) => println!("{msg}"),
                    CommandResult::Alert(msg) => eprintln!("{}", formatter::format_alert(&msg)),
                    CommandResult::SetName(new_name) => {
                        match &new_name {
                            Some(n) => println!("Posting as {n}"),
                            None => println!("Posting anonymously"),
                        }
                        name = new_name;
                    }
                }
                prompt(name.as_deref());
            }
        }
    }

    Ok(())
}
