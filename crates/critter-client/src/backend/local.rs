use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use critter_db::Database;
use critter_db::models::{NotificationRow, UserRow};
use critter_types::{ChangeEvent, NotificationEntry, Sender, UserSnapshot};

use super::dispatcher::Dispatcher;
use crate::error::{ClientError, Result};
use crate::notifications::{ChannelId, EventChannel, NotificationSource};
use crate::search::UserDirectory;

const SEARCH_LIMIT: u32 = 25;

/// In-process stand-in for the hosted backend: rows live in the local
/// database and realtime channels are served by a [`Dispatcher`].
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // Run blocking DB calls off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await?
            .map_err(ClientError::Storage)
    }

    pub async fn upsert_user(&self, user: &UserSnapshot) -> Result<()> {
        let id = user.id.clone();
        let name = user
            .name
            .clone()
            .or_else(|| user.username.clone())
            .unwrap_or_else(|| user.id.clone());
        let username = user.username.clone();
        let image = user.image.clone();
        self.blocking(move |db| db.upsert_user(&id, &name, username.as_deref(), image.as_deref()))
            .await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserSnapshot>> {
        let id = id.to_string();
        let row = self.blocking(move |db| db.get_user_by_id(&id)).await?;
        Ok(row.map(user_from_row))
    }

    /// Store a notification for `receiver_id` and push an insert event to
    /// that receiver's open channels.
    pub async fn notify(
        &self,
        receiver_id: &str,
        sender_id: Option<&str>,
        title: &str,
        data: &serde_json::Value,
    ) -> Result<NotificationEntry> {
        let id = Uuid::new_v4().to_string();
        let data = serde_json::to_string(data)?;

        let row = {
            let (row_id, receiver, sender, title) = (
                id.clone(),
                receiver_id.to_string(),
                sender_id.map(str::to_string),
                title.to_string(),
            );
            self.blocking(move |db| {
                db.insert_notification(&row_id, &receiver, sender.as_deref(), &title, &data)?;
                db.get_notification(&row_id)
            })
            .await?
            .ok_or_else(|| ClientError::NotFound(id.clone()))?
        };

        let delivered = self
            .dispatcher
            .publish(ChangeEvent::NotificationInsert {
                id: row.id.clone(),
                receiver_id: row.receiver_id.clone(),
                sender_id: row.sender_id.clone(),
                created_at: row.created_at.clone(),
            })
            .await;
        info!("Notification {} for {} reached {} channel(s)", id, receiver_id, delivered);

        Ok(entry_from_row(row))
    }
}

#[async_trait]
impl NotificationSource for LocalBackend {
    async fn fetch_notifications(&self, receiver_id: &str) -> Result<Vec<NotificationEntry>> {
        let receiver_id = receiver_id.to_string();
        let rows = self
            .blocking(move |db| db.get_notifications_for_receiver(&receiver_id))
            .await?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn fetch_notification(&self, id: &str) -> Result<Option<NotificationEntry>> {
        let id = id.to_string();
        let row = self.blocking(move |db| db.get_notification(&id)).await?;
        Ok(row.map(entry_from_row))
    }

    async fn delete_notification(&self, id: &str) -> Result<()> {
        let owned = id.to_string();
        let removed = self.blocking(move |db| db.delete_notification(&owned)).await?;
        if !removed {
            debug!("Delete of unknown notification {}", id);
        }
        Ok(())
    }

    async fn open_channel(&self, receiver_id: &str) -> Result<EventChannel> {
        let (id, events) = self.dispatcher.register_channel(receiver_id).await;
        Ok(EventChannel { id, events })
    }

    async fn close_channel(&self, id: ChannelId) {
        self.dispatcher.unregister_channel(id).await;
    }
}

#[async_trait]
impl UserDirectory for LocalBackend {
    async fn search_users(&self, query: &str) -> Result<Vec<UserSnapshot>> {
        let query = query.to_string();
        let rows = self
            .blocking(move |db| db.search_users(&query, SEARCH_LIMIT))
            .await?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

fn user_from_row(row: UserRow) -> UserSnapshot {
    let mut user = UserSnapshot::new(row.id).with_name(row.name);
    user.username = row.username;
    user.image = row.image;
    user
}

fn entry_from_row(row: NotificationRow) -> NotificationEntry {
    let sender = match (row.sender_id, row.sender_name) {
        (Some(id), Some(name)) => Some(Sender {
            id,
            name,
            image: row.sender_image,
        }),
        _ => None,
    };

    NotificationEntry {
        id: row.id,
        data: row.data,
        title: row.title,
        created_at: row.created_at,
        sender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> LocalBackend {
        LocalBackend::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn notify_stores_joined_row_and_publishes() {
        let backend = backend();
        backend
            .upsert_user(&UserSnapshot::new("s1").with_name("Sender").with_image("s.png"))
            .await
            .unwrap();
        let mut channel = backend.open_channel("r1").await.unwrap();

        let created = backend
            .notify("r1", Some("s1"), "liked your post", &json!({"postId": "p1"}))
            .await
            .unwrap();
        assert_eq!(created.sender.as_ref().map(|s| s.name.as_str()), Some("Sender"));

        match channel.events.recv().await.unwrap() {
            ChangeEvent::NotificationInsert { id, receiver_id, .. } => {
                assert_eq!(id, created.id);
                assert_eq!(receiver_id, "r1");
            }
        }

        let listed = backend.fetch_notifications("r1").await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert!(backend.fetch_notifications("r2").await.unwrap().is_empty());

        backend.delete_notification(&created.id).await.unwrap();
        backend.delete_notification(&created.id).await.unwrap();
        assert!(backend.fetch_notification(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_directory_falls_back_to_id_for_name() {
        let backend = backend();
        backend.upsert_user(&UserSnapshot::new("rex")).await.unwrap();

        let hits = backend.search_users("re").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name.as_deref(), Some("rex"));
        assert_eq!(backend.get_user("rex").await.unwrap().unwrap().id, "rex");
        assert!(backend.get_user("nobody").await.unwrap().is_none());
    }
}
