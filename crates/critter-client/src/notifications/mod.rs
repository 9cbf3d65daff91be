//! Per-user notification list kept live by a realtime channel.

mod feed;
mod source;

pub use feed::{FeedPhase, NotificationFeed, Subscription, fetch_all, subscribe};
pub use source::{ChannelId, EventChannel, NotificationSource};
