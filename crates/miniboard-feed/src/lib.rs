//! miniboard feed - client-side realtime reconciliation and threading.
//!
//! A board is a list of posts kept in sync with a backend change feed.
//! [`FeedStore`] holds the local snapshot and computes the display order,
//! [`ChangeSubscription`] bridges the change feed into the store, and
//! [`FeedView`] ties both to the lifetime of one mounted board.
//!
//! # Example
//!
//! ```ignore
//! use miniboard_feed::{FeedOptions, FeedView, Layout};
//!
//! let backend = miniboard_backend::connect(&config)?;
//! let view = FeedView::mount(backend, FeedOptions::new(config).with_layout(Layout::Threaded)).await;
//!
//! view.submit("hello", Some("alice"), None).await?;
//! let mut updates = view.watch();
//! while updates.changed().await.is_ok() {
//!     for post in &updates.borrow().display {
//!         println!("{} {}", post.id, post.content);
//!     }
//! }
//! ```

pub mod error;
pub mod layout;
pub mod store;
pub mod subscription;
pub mod thread;
pub mod view;

pub use error::{Error, Result};
pub use layout::{Layout, ReloadPolicy};
pub use store::{FeedSnapshot, FeedStore, Submitted};
pub use subscription::{ChangeSubscription, SubscriptionState};
pub use thread::thread_order;
pub use view::{FeedOptions, FeedView};
