//! Bounded, recency-ordered cache of users the signed-in person searched
//! for, persisted as a single JSON blob in the key-value store.
//!
//! Every operation is a read-modify-write of the whole blob. Two `save`
//! calls issued concurrently can interleave and the last write wins; the
//! cache is meant to be driven from one interaction at a time.

use std::sync::Arc;

use tracing::{debug, warn};

use critter_types::{RecentSearchEntry, UserSnapshot};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::kv::KeyValueStore;

pub const MAX_RECENT_SEARCHES: usize = 10;

pub const RECENT_SEARCHES_KEY: &str = "recent_searches";

pub struct RecentSearchCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
}

impl RecentSearchCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            key: RECENT_SEARCHES_KEY.to_string(),
        }
    }

    /// Use a different storage key, e.g. one per signed-in account.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// All entries, most recent first. Never fails: unreadable or corrupt
    /// storage yields an empty list.
    pub async fn load(&self) -> Vec<RecentSearchEntry> {
        match self.read().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read recent searches: {}", e);
                Vec::new()
            }
        }
    }

    /// Record a search for `user`, moving it to the front if it was
    /// already present. Failures are logged and leave storage untouched.
    pub async fn save(&self, user: UserSnapshot) {
        if let Err(e) = self.try_save(user).await {
            warn!("Failed to save recent search: {}", e);
        }
    }

    pub async fn remove(&self, user_id: &str) {
        if let Err(e) = self.try_remove(user_id).await {
            warn!("Failed to remove recent search {}: {}", user_id, e);
        }
    }

    pub async fn clear_all(&self) {
        match self.store.delete(&self.key).await {
            Ok(()) => debug!("Cleared recent searches"),
            Err(e) => warn!("Failed to clear recent searches: {}", e),
        }
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.load().await.iter().any(|entry| entry.id() == user_id)
    }

    async fn try_save(&self, user: UserSnapshot) -> Result<()> {
        // An I/O failure aborts here, before anything is written. A corrupt
        // blob is treated as empty so the next write replaces it.
        let mut entries = self.read_or_reset().await?;

        entries.retain(|entry| entry.id() != user.id);
        let user_id = user.id.clone();
        entries.insert(0, RecentSearchEntry::new(user, self.clock.now_millis()));
        entries.truncate(MAX_RECENT_SEARCHES);

        self.write(&entries).await?;
        debug!("Saved recent search {} ({} stored)", user_id, entries.len());
        Ok(())
    }

    async fn try_remove(&self, user_id: &str) -> Result<()> {
        let mut entries = self.read_or_reset().await?;
        let before = entries.len();
        entries.retain(|entry| entry.id() != user_id);

        if entries.len() == before {
            return Ok(());
        }
        self.write(&entries).await
    }

    async fn read(&self) -> Result<Vec<RecentSearchEntry>> {
        match self.store.get(&self.key).await? {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn read_or_reset(&self) -> Result<Vec<RecentSearchEntry>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match decode(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Discarding corrupt recent searches: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn write(&self, entries: &[RecentSearchEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.store.set(&self.key, raw).await
    }
}

fn decode(raw: &str) -> Result<Vec<RecentSearchEntry>> {
    let mut entries: Vec<RecentSearchEntry> = serde_json::from_str(raw)?;
    // Stable sort: equal timestamps keep their stored order
    entries.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
    Ok(entries)
}
