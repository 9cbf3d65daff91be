use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use critter_types::ChangeEvent;

/// Open realtime channel: the receiver it is filtered on and its sender.
struct ChannelEntry {
    receiver_id: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

/// Routes change events to the channels filtered on the event's receiver.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// channel_id -> channel
    channels: RwLock<HashMap<Uuid, ChannelEntry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for one receiver. Returns (channel_id, receiver).
    pub async fn register_channel(
        &self,
        receiver_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<ChangeEvent>) {
        let channel_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.channels.write().await.insert(
            channel_id,
            ChannelEntry {
                receiver_id: receiver_id.to_string(),
                tx,
            },
        );
        debug!("Registered channel {} for {}", channel_id, receiver_id);
        (channel_id, rx)
    }

    /// Close a channel. Returns false if it was already gone.
    pub async fn unregister_channel(&self, channel_id: Uuid) -> bool {
        self.inner.channels.write().await.remove(&channel_id).is_some()
    }

    /// Deliver an event to every channel filtered on its receiver.
    /// Channels whose consumer went away are pruned. Returns the number of
    /// channels the event reached.
    pub async fn publish(&self, event: ChangeEvent) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;
        {
            let channels = self.inner.channels.read().await;
            for (id, channel) in channels.iter() {
                if channel.receiver_id != event.receiver_id() {
                    continue;
                }
                if channel.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut channels = self.inner.channels.write().await;
            for id in closed {
                channels.remove(&id);
                debug!("Pruned closed channel {}", id);
            }
        }

        delivered
    }

    pub async fn channel_count(&self) -> usize {
        self.inner.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_for(receiver: &str) -> ChangeEvent {
        ChangeEvent::NotificationInsert {
            id: "n1".into(),
            receiver_id: receiver.into(),
            sender_id: None,
            created_at: "2026-03-01 10:00:00".into(),
        }
    }

    #[tokio::test]
    async fn routes_by_receiver() {
        let dispatcher = Dispatcher::new();
        let (_, mut alice) = dispatcher.register_channel("alice").await;
        let (_, mut bob) = dispatcher.register_channel("bob").await;

        assert_eq!(dispatcher.publish(insert_for("alice")).await, 1);
        assert_eq!(alice.recv().await, Some(insert_for("alice")));
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_and_prune() {
        let dispatcher = Dispatcher::new();
        let (id, _rx) = dispatcher.register_channel("alice").await;
        let (_, dropped) = dispatcher.register_channel("alice").await;
        drop(dropped);

        assert_eq!(dispatcher.publish(insert_for("alice")).await, 1);
        assert_eq!(dispatcher.channel_count().await, 1);

        assert!(dispatcher.unregister_channel(id).await);
        assert!(!dispatcher.unregister_channel(id).await);
        assert_eq!(dispatcher.publish(insert_for("alice")).await, 0);
    }
}
