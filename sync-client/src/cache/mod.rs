//! Local snapshot cache.
//!
//! The cache is advisory: it holds the last snapshot delivered while live so
//! there is something to show offline. [`LocalCache::load`] never fails past
//! its boundary; problems are logged and an empty snapshot is returned.

mod file;
mod memory;

pub use file::{validate_key, FileStore};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chat_sync_types::Snapshot;
use tracing::{debug, warn};

pub use crate::error::StorageError;

/// Key the snapshot is cached under.
pub const DEFAULT_CACHE_KEY: &str = "messages";

/// String key-value store provided by the platform.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value.
    ///
    /// Returns `Ok(true)` if removed, `Ok(false)` if not found.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// Snapshot cache over a [`KeyValueStore`], stored as a JSON array.
#[derive(Debug, Clone)]
pub struct LocalCache<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> LocalCache<S> {
    /// Create a cache storing its snapshot under `key`.
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Persist a snapshot, replacing the cached one.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let json = snapshot.to_json().map_err(StorageError::Encode)?;
        self.store.set(&self.key, &json).await
    }

    /// Load the cached snapshot.
    ///
    /// Returns an empty snapshot if nothing is cached or the entry cannot be
    /// read or decoded.
    pub async fn load(&self) -> Snapshot {
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                debug!(key = %self.key, messages = snapshot.len(), "loaded cached snapshot");
                snapshot
            }
            Ok(None) => {
                debug!(key = %self.key, "no cached snapshot");
                Snapshot::empty()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "ignoring unreadable cache entry");
                Snapshot::empty()
            }
        }
    }

    /// Load the cached snapshot, reporting failures.
    pub async fn try_load(&self) -> Result<Option<Snapshot>, StorageError> {
        match self.store.get(&self.key).await? {
            Some(json) => Snapshot::from_json(&json)
                .map(Some)
                .map_err(StorageError::Decode),
            None => Ok(None),
        }
    }

    /// Drop the cached snapshot.
    pub async fn clear(&self) -> Result<bool, StorageError> {
        self.store.remove(&self.key).await
    }

    /// The key the snapshot lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_sync_types::{Author, Message, MessageId};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> Snapshot {
        Snapshot::new(vec![Message::new(
            MessageId::new("a"),
            "hi",
            Utc.timestamp_opt(1, 0).unwrap(),
            Author::new("u1", "Ada"),
            None,
        )
        .unwrap()])
    }

    #[tokio::test]
    async fn save_then_load() {
        let cache = LocalCache::new(MemoryStore::new(), DEFAULT_CACHE_KEY);

        cache.save(&snapshot()).await.unwrap();

        assert_eq!(cache.load().await, snapshot());
    }

    #[tokio::test]
    async fn stores_json_array_under_key() {
        let store = MemoryStore::new();
        let cache = LocalCache::new(store.clone(), "messages");

        cache.save(&snapshot()).await.unwrap();

        let raw = store.get("messages").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["_id"], "a");
        assert_eq!(value[0]["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn missing_entry_loads_empty() {
        let cache = LocalCache::new(MemoryStore::new(), DEFAULT_CACHE_KEY);
        assert!(cache.load().await.is_empty());
        assert!(cache.try_load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_loads_empty() {
        let store = MemoryStore::new();
        store.set("messages", "{not json").await.unwrap();
        let cache = LocalCache::new(store, "messages");

        assert!(cache.load().await.is_empty());
        assert!(matches!(
            cache.try_load().await,
            Err(StorageError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn read_failure_loads_empty() {
        let store = MemoryStore::new();
        let cache = LocalCache::new(store.clone(), "messages");
        cache.save(&snapshot()).await.unwrap();

        store.fail_next_get("disk gone");

        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let store = MemoryStore::new();
        let cache = LocalCache::new(store.clone(), "messages");
        store.fail_next_set("disk full");

        let result = cache.save(&snapshot()).await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_entry() {
        let cache = LocalCache::new(MemoryStore::new(), "messages");
        cache.save(&snapshot()).await.unwrap();

        assert!(cache.clear().await.unwrap());
        assert!(!cache.clear().await.unwrap());
        assert!(cache.load().await.is_empty());
    }
}
