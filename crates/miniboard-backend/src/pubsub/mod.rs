//! Pub-sub infrastructure for change notifications.
//!
//! Subscribers register per table with an event filter and receive
//! [`miniboard_proto::ChangeEvent`]s on their own channel.

mod manager;
mod subscription;

pub use manager::PubSubManager;
pub use subscription::SubscriptionEntry;
