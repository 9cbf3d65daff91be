//! User search and the recent-search bookkeeping around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use critter_types::{RecentSearchEntry, UserSnapshot};

use crate::debounce::Debouncer;
use crate::error::Result;
use crate::recent_search::RecentSearchCache;

/// Free-text user lookup provided by the backend.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn search_users(&self, query: &str) -> Result<Vec<UserSnapshot>>;
}

/// Search screen state for one signed-in user.
pub struct SearchSession {
    directory: Arc<dyn UserDirectory>,
    recents: Arc<RecentSearchCache>,
    current_user_id: Option<String>,
}

impl SearchSession {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        recents: Arc<RecentSearchCache>,
        current_user_id: Option<String>,
    ) -> Self {
        Self {
            directory,
            recents,
            current_user_id,
        }
    }

    /// Blank queries return nothing without hitting the directory.
    pub async fn search(&self, query: &str) -> Result<Vec<UserSnapshot>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.directory.search_users(query).await?;
        debug!("Search '{}' returned {} user(s)", query, users.len());
        Ok(users)
    }

    /// Record that the user opened `user` from the results. Selecting
    /// yourself is not recorded. Returns whether the selection was saved.
    pub async fn select(&self, user: UserSnapshot) -> bool {
        if self.current_user_id.as_deref() == Some(user.id.as_str()) {
            return false;
        }
        self.recents.save(user).await;
        true
    }

    pub async fn recent(&self) -> Vec<RecentSearchEntry> {
        self.recents.load().await
    }
}

/// Search-as-you-type: each query replaces the previous one and only runs
/// after the debounce delay. Results are published on a watch channel.
pub struct LiveSearch {
    session: Arc<SearchSession>,
    debouncer: Debouncer,
    results: Arc<watch::Sender<Vec<UserSnapshot>>>,
}

impl LiveSearch {
    pub fn new(session: Arc<SearchSession>, delay: Duration) -> Self {
        let (results, _) = watch::channel(Vec::new());
        Self {
            session,
            debouncer: Debouncer::new(delay),
            results: Arc::new(results),
        }
    }

    pub fn results(&self) -> watch::Receiver<Vec<UserSnapshot>> {
        self.results.subscribe()
    }

    pub fn set_query(&mut self, query: &str) {
        if query.trim().is_empty() {
            self.debouncer.cancel();
            self.results.send_replace(Vec::new());
            return;
        }

        let session = self.session.clone();
        let results = self.results.clone();
        let query = query.to_string();
        self.debouncer.schedule(move || async move {
            match session.search(&query).await {
                Ok(users) => {
                    results.send_replace(users);
                }
                Err(e) => warn!("Search '{}' failed: {}", query, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDirectory {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn search_users(&self, query: &str) -> Result<Vec<UserSnapshot>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![
                UserSnapshot::new("me").with_name(format!("{query} (you)")),
                UserSnapshot::new("u2").with_name(format!("{query} friend")),
            ])
        }
    }

    fn session() -> (Arc<SearchSession>, Arc<FakeDirectory>) {
        let directory = Arc::new(FakeDirectory::default());
        let recents = Arc::new(RecentSearchCache::new(Arc::new(MemoryStore::new())));
        let session = SearchSession::new(directory.clone(), recents, Some("me".into()));
        (Arc::new(session), directory)
    }

    #[tokio::test]
    async fn blank_query_skips_directory() {
        let (session, directory) = session();
        assert!(session.search("   ").await.unwrap().is_empty());
        assert!(directory.queries.lock().unwrap().is_empty());

        assert_eq!(session.search(" mo ").await.unwrap().len(), 2);
        assert_eq!(*directory.queries.lock().unwrap(), ["mo"]);
    }

    #[tokio::test]
    async fn selecting_yourself_is_not_recorded() {
        let (session, _) = session();
        let results = session.search("mo").await.unwrap();

        assert!(!session.select(results[0].clone()).await);
        assert!(session.select(results[1].clone()).await);

        let recent = session.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id(), "u2");
    }

    #[tokio::test]
    async fn live_search_runs_only_the_last_query() {
        let (session, directory) = session();
        let mut live = LiveSearch::new(session, Duration::from_millis(30));
        let mut results = live.results();

        live.set_query("m");
        live.set_query("mo");
        live.set_query("moc");

        tokio::time::timeout(Duration::from_secs(2), results.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*directory.queries.lock().unwrap(), ["moc"]);
        assert_eq!(results.borrow()[1].name.as_deref(), Some("moc friend"));

        live.set_query("");
        assert!(results.borrow_and_update().is_empty());
    }
}
