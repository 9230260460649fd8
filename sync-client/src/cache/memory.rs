//! In-memory key-value store.
//!
//! Not persistent - all data is lost when the last clone is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{KeyValueStore, StorageError};

/// In-memory key-value store for testing.
///
/// Clones share state. Failures can be injected per operation.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    values: HashMap<String, String>,
    writes: usize,
    fail_next_get: Option<String>,
    fail_next_set: Option<String>,
}

fn lock(inner: &Mutex<MemoryStoreInner>) -> MutexGuard<'_, MemoryStoreInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        lock(&self.inner).writes
    }

    /// Cause the next get() to fail with the given error.
    pub fn fail_next_get(&self, error: &str) {
        lock(&self.inner).fail_next_get = Some(error.to_string());
    }

    /// Cause the next set() to fail with the given error.
    pub fn fail_next_set(&self, error: &str) {
        lock(&self.inner).fail_next_set = Some(error.to_string());
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).values.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut inner = lock(&self.inner);
        if let Some(error) = inner.fail_next_get.take() {
            return Err(StorageError::Unavailable(error));
        }
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = lock(&self.inner);
        if let Some(error) = inner.fail_next_set.take() {
            return Err(StorageError::Unavailable(error));
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(lock(&self.inner).values.remove(key).is_some())
    }
}
