//! miniboard - a realtime message board in the terminal.

mod commands;
mod formatter;
mod repl;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use miniboard_client::ClientConfig;
use miniboard_feed::{FeedOptions, FeedView, Layout, ReloadPolicy, Submitted};

/// miniboard terminal client
#[derive(Parser, Debug)]
#[command(name = "miniboard")]
#[command(version, about = "Realtime message board")]
pub struct Args {
    /// Backend URL (defaults to MINIBOARD_URL, then local://)
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Display layout: threaded or flat
    #[arg(long, default_value = "threaded")]
    pub layout: Layout,

    /// Reaction to change events: full or incremental
    #[arg(long, default_value = "full")]
    pub reload: ReloadPolicy,

    /// Display name for new posts
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Seed the board with a few posts
    #[arg(long)]
    pub demo: bool,
}

impl Args {
    fn into_options(self) -> (FeedOptions, Option<String>, bool) {
        let mut config = ClientConfig::from_env().with_timeout(Duration::from_secs(self.timeout));
        if let Some(url) = self.url {
            config.url = url;
        }
        let options = FeedOptions::new(config)
            .with_layout(self.layout)
            .with_reload(self.reload);
        (options, self.name, self.demo)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("miniboard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (options, name, demo) = args.into_options();
    let backend = miniboard_backend::connect(&options.config)?;
    let view = FeedView::mount(backend, options).await;

    if demo {
        seed_demo(&view).await?;
    }

    let result = repl::run(&view, name).await;
    view.unmount();
    result
}

/// Post a short conversation so an empty local board has something to show.
async fn seed_demo(view: &FeedView) -> Result<(), Box<dyn std::error::Error>> {
    let welcome = view
        .submit("Welcome to miniboard!", Some("admin"), None)
        .await?;
    if let Submitted::Accepted(welcome) = welcome {
        view.submit("Glad to be here", None, Some(welcome.id)).await?;
        view.submit("Replies show up under their post", Some("bob"), Some(welcome.id))
            .await?;
    }
    view.submit("Anyone around?", Some("carol"), None).await?;
    tracing::info!("demo posts seeded");
    Ok(())
}
