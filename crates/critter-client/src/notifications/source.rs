use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use critter_types::{ChangeEvent, NotificationEntry};

use crate::error::Result;

pub type ChannelId = Uuid;

/// An open realtime channel delivering change events for one receiver.
pub struct EventChannel {
    pub id: ChannelId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Remote side of the notification feed: queries, deletes and realtime
/// channels, all scoped by receiver id.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Every notification addressed to `receiver_id`, in server order.
    async fn fetch_notifications(&self, receiver_id: &str) -> Result<Vec<NotificationEntry>>;

    /// Point lookup of one notification joined with its sender.
    async fn fetch_notification(&self, id: &str) -> Result<Option<NotificationEntry>>;

    /// Deleting an id that does not exist is not an error.
    async fn delete_notification(&self, id: &str) -> Result<()>;

    /// Open a channel receiving insert events where `receiver_id` matches.
    async fn open_channel(&self, receiver_id: &str) -> Result<EventChannel>;

    /// Release a channel. Unknown ids are ignored.
    async fn close_channel(&self, id: ChannelId);
}
