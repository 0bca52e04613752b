//! miniboard client - the backend surface used by the board.
//!
//! This crate defines the [`Backend`] trait a hosted data service must
//! provide, the typed [`PostsClient`] wrapper over it, and the client
//! configuration.
//!
//! # Quick Start
//!
//! ```ignore
//! use miniboard_client::{ClientConfig, PostsClient};
//! use miniboard_proto::{EventFilter, SortOrder};
//!
//! let client = PostsClient::new(backend, ClientConfig::from_env());
//!
//! // Load the board
//! let posts = client.fetch_posts(SortOrder::Ascending).await?;
//!
//! // Watch for changes
//! let mut subscription = client.subscribe(EventFilter::ALL).await?;
//! while let Some(event) = subscription.recv().await {
//!     println!("{} on {}", event.change_type, event.table);
//! }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;

pub use backend::{Backend, Subscription};
pub use client::PostsClient;
pub use config::ClientConfig;
pub use error::Error;

/// Re-export protocol types.
pub use miniboard_proto as proto;
