//! Persistent key-value storage used for cross-session caches.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

/// Minimal string key-value store. Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> eyre::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> eyre::Result<()>;
    async fn remove(&self, key: &str) -> eyre::Result<()>;
    /// Remove every key starting with `prefix`; returns how many were removed.
    async fn remove_prefix(&self, prefix: &str) -> eyre::Result<u64>;
}

/// Process-local store. Used in tests and when the on-disk cache can't be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        let guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> eyre::Result<()> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> eyre::Result<u64> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|k, _| !k.starts_with(prefix));
        Ok(u64::try_from(before - guard.len()).unwrap_or(u64::MAX))
    }
}
