//! Device-local key-value persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use critter_db::Database;

use crate::error::{ClientError, Result};

/// String key-value storage. Every call may fail; callers decide whether
/// a failure is fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Volatile store, handy for tests and signed-out sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Store backed by the `kv_store` table of the local database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        // Run blocking DB calls off the async runtime
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || db.kv_get(&key))
            .await?
            .map_err(ClientError::Storage)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || db.kv_set(&key, &value))
            .await?
            .map_err(ClientError::Storage)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let db = self.db.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || db.kv_delete(&key))
            .await?
            .map(|_| ())
            .map_err(ClientError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1".into()).await.unwrap();
        store.set("a", "2".into()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_semantics() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_semantics() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        exercise(&SqliteStore::new(db)).await;
    }
}
