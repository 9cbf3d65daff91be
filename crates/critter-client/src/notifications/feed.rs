use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use critter_types::{ChangeEvent, NotificationEntry};

use super::source::{ChannelId, NotificationSource};

/// Where the historical load stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// No user yet, nothing requested.
    Idle,
    Fetching,
    Ready,
}

/// Handle on a live realtime channel plus the task draining it.
///
/// `stop` releases both and is safe to call any number of times. Dropping
/// a running subscription aborts the task and releases the channel in the
/// background when a runtime is available.
pub struct Subscription {
    source: Arc<dyn NotificationSource>,
    channel: Option<ChannelId>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription that never delivers anything.
    pub fn inactive(source: Arc<dyn NotificationSource>) -> Self {
        Self {
            source,
            channel: None,
            task: None,
        }
    }

    /// False once stopped, or once the source closed the channel and the
    /// relay task ran out of events.
    pub fn is_active(&self) -> bool {
        self.channel.is_some() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Wait for the abort so no callback runs after we return
            let _ = task.await;
        }
        if let Some(id) = self.channel.take() {
            self.source.close_channel(id).await;
            debug!("Closed notification channel {}", id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(id) = self.channel.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let source = self.source.clone();
                    handle.spawn(async move { source.close_channel(id).await });
                }
                Err(_) => warn!("Notification channel {} dropped outside a runtime", id),
            }
        }
    }
}

/// One-shot historical load. Failures are logged and reported as `None`.
pub async fn fetch_all(
    source: &dyn NotificationSource,
    user_id: &str,
) -> Option<Vec<NotificationEntry>> {
    match source.fetch_notifications(user_id).await {
        Ok(items) => Some(items),
        Err(e) => {
            warn!("Failed to fetch notifications for {}: {}", user_id, e);
            None
        }
    }
}

/// Open a realtime channel for `user_id` and hand every inserted
/// notification, fully joined, to `on_insert`.
///
/// Inserts whose point lookup fails or comes back empty are dropped. If
/// the channel cannot be opened the returned subscription is inactive.
pub async fn subscribe<F>(
    source: Arc<dyn NotificationSource>,
    user_id: &str,
    on_insert: F,
) -> Subscription
where
    F: Fn(NotificationEntry) + Send + Sync + 'static,
{
    let mut channel = match source.open_channel(user_id).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Failed to subscribe to notifications for {}: {}", user_id, e);
            return Subscription::inactive(source);
        }
    };

    let channel_id = channel.id;
    let task_source = source.clone();
    let user_id = user_id.to_string();
    info!("Subscribed to notifications for {} on channel {}", user_id, channel_id);

    let task = tokio::spawn(async move {
        while let Some(event) = channel.events.recv().await {
            let ChangeEvent::NotificationInsert { id, receiver_id, .. } = event;
            if receiver_id != user_id {
                continue;
            }

            match task_source.fetch_notification(&id).await {
                Ok(Some(entry)) => on_insert(entry),
                Ok(None) => warn!("Notification {} vanished before lookup, dropping", id),
                Err(e) => warn!("Lookup of notification {} failed, dropping: {}", id, e),
            }
        }
        debug!("Notification channel {} closed by source", channel_id);
    });

    Subscription {
        source,
        channel: Some(channel_id),
        task: Some(task),
    }
}

struct ListState {
    items: Vec<NotificationEntry>,
    phase: FeedPhase,
    /// Ids prepended by the push path before the pending fetch landed.
    pushed_during_fetch: HashSet<String>,
}

struct FeedList {
    state: Mutex<ListState>,
    revision: watch::Sender<u64>,
}

impl FeedList {
    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Push path: newest first, ignoring ids already shown.
    fn prepend(&self, entry: NotificationEntry) {
        {
            let mut state = self.lock();
            if state.items.iter().any(|item| item.id == entry.id) {
                debug!("Ignoring duplicate notification {}", entry.id);
                return;
            }
            if state.phase != FeedPhase::Ready {
                state.pushed_during_fetch.insert(entry.id.clone());
            }
            state.items.insert(0, entry);
        }
        self.bump();
    }
}

/// Live notification list for the signed-in user.
///
/// Seeded by [`fetch_all`], extended by [`subscribe`] inserts (prepended in
/// arrival order, not re-sorted by `created_at`) and shrunk by
/// [`NotificationFeed::delete`].
pub struct NotificationFeed {
    source: Arc<dyn NotificationSource>,
    user_id: Option<String>,
    list: Arc<FeedList>,
    subscription: Subscription,
}

impl NotificationFeed {
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            subscription: Subscription::inactive(source.clone()),
            source,
            user_id: None,
            list: Arc::new(FeedList {
                state: Mutex::new(ListState {
                    items: Vec::new(),
                    phase: FeedPhase::Idle,
                    pushed_during_fetch: HashSet::new(),
                }),
                revision,
            }),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn items(&self) -> Vec<NotificationEntry> {
        self.list.lock().items.clone()
    }

    pub fn phase(&self) -> FeedPhase {
        self.list.lock().phase
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Revision counter bumped on every list change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.list.revision.subscribe()
    }

    /// Point the feed at a (possibly different) signed-in user.
    ///
    /// Any existing subscription is torn down first. Switching accounts
    /// clears the previous account's items; `None` leaves the feed idle.
    pub async fn set_user(&mut self, user_id: Option<String>) {
        if self.user_id == user_id && (user_id.is_none() || self.subscription.is_active()) {
            return;
        }

        self.unsubscribe().await;

        if self.user_id != user_id {
            {
                let mut state = self.list.lock();
                state.items.clear();
                state.pushed_during_fetch.clear();
                state.phase = FeedPhase::Idle;
            }
            self.list.bump();
            self.user_id = user_id;
        }

        let Some(user_id) = self.user_id.clone() else {
            return;
        };

        // Inserts landing before the first fetch completes must survive it
        self.list.lock().phase = FeedPhase::Fetching;
        let list = self.list.clone();
        self.subscription = subscribe(self.source.clone(), &user_id, move |entry| {
            list.prepend(entry)
        })
        .await;
        self.refresh().await;
    }

    /// Reload the list from the source. A failed reload keeps the current
    /// items. Returns whether the reload succeeded.
    ///
    /// Inserts pushed since the channel opened that are missing from the
    /// fetched snapshot stay at the head of the list.
    pub async fn refresh(&self) -> bool {
        let Some(user_id) = self.user_id.as_deref() else {
            return false;
        };

        self.list.lock().phase = FeedPhase::Fetching;
        let fetched = fetch_all(self.source.as_ref(), user_id).await;

        let ok = {
            let mut state = self.list.lock();
            state.phase = FeedPhase::Ready;
            let pushed = std::mem::take(&mut state.pushed_during_fetch);
            match fetched {
                Some(items) => {
                    let fetched = dedup_by_id(items);
                    let known: HashSet<&str> = fetched.iter().map(|item| item.id.as_str()).collect();
                    let mut merged: Vec<NotificationEntry> = state
                        .items
                        .iter()
                        .filter(|item| pushed.contains(&item.id) && !known.contains(item.id.as_str()))
                        .cloned()
                        .collect();
                    if !merged.is_empty() {
                        debug!("Keeping {} notification(s) pushed during fetch", merged.len());
                    }
                    merged.extend(fetched);
                    state.items = merged;
                    true
                }
                None => false,
            }
        };
        self.list.bump();
        ok
    }

    /// Delete remotely, then drop the item locally. On failure nothing
    /// changes and `false` is returned.
    pub async fn delete(&self, notification_id: &str) -> bool {
        if let Err(e) = self.source.delete_notification(notification_id).await {
            warn!("Failed to delete notification {}: {}", notification_id, e);
            return false;
        }

        let removed = {
            let mut state = self.list.lock();
            let before = state.items.len();
            state.items.retain(|item| item.id != notification_id);
            state.items.len() != before
        };
        if removed {
            self.list.bump();
        }
        true
    }

    /// Release the realtime channel. Idempotent.
    pub async fn unsubscribe(&mut self) {
        self.subscription.stop().await;
    }

    /// Tear down on unmount: stop the subscription and go idle. The items
    /// stay readable until the feed is dropped.
    pub async fn close(&mut self) {
        self.unsubscribe().await;
        self.list.lock().phase = FeedPhase::Idle;
    }
}

fn dedup_by_id(items: Vec<NotificationEntry>) -> Vec<NotificationEntry> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}
