use crate::types::Route;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time::Instant;

pub const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone)]
pub struct QuoteCacheEntry {
    pub route: Arc<Route>,
    pub cached_at: Instant,
}

/// Process-wide route cache. Hits return the same `Arc` that was stored.
#[derive(Debug)]
pub struct QuoteCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, QuoteCacheEntry>>,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_TTL)
    }
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, QuoteCacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached route if younger than the TTL. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<Arc<Route>> {
        let mut entries = self.lock();
        let fresh = entries.get(key).map(|e| e.cached_at.elapsed() < self.ttl)?;
        if fresh {
            entries.get(key).map(|e| Arc::clone(&e.route))
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn set(&self, key: String, route: Arc<Route>) {
        self.lock().insert(
            key,
            QuoteCacheEntry {
                route,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn evict(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.cached_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
