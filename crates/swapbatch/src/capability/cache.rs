use crate::{
    db::now_ms,
    kv::KvStore,
    types::{CapabilitySnapshot, WalletProvider},
};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

pub const CACHE_PREFIX: &str = "swapbatch:caps:";
pub const DEFAULT_CAPABILITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCapabilities {
    pub cached_at: i64,
    pub caps: CapabilitySnapshot,
}

pub fn cache_key(provider: WalletProvider, account: Address, chain_id: u64) -> String {
    format!("{CACHE_PREFIX}{provider}:{account:#x}:eip155:{chain_id}")
}

/// Capability snapshots persisted in a [`KvStore`] with a TTL.
#[derive(Clone)]
pub struct CapabilityCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl std::fmt::Debug for CapabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CapabilityCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// A fresh snapshot for `key`. Expired or unreadable entries are removed.
    pub async fn get(&self, key: &str) -> Option<CapabilitySnapshot> {
        let raw = match self.store.get(key).await {
            Ok(v) => v?,
            Err(e) => {
                warn!(key, error = %format!("{e:#}"), "capability cache read failed");
                return None;
            }
        };
        let fresh = match serde_json::from_str::<CachedCapabilities>(&raw) {
            Ok(entry) => {
                let now = now_ms().ok()?;
                (now.saturating_sub(entry.cached_at) < self.ttl_ms()).then_some(entry.caps)
            }
            Err(e) => {
                debug!(key, error = %e, "dropping unreadable capability cache entry");
                None
            }
        };
        if fresh.is_none() {
            self.remove(key).await;
        }
        fresh
    }

    pub async fn put(&self, key: &str, caps: &CapabilitySnapshot) {
        let entry = match now_ms() {
            Ok(cached_at) => CachedCapabilities {
                cached_at,
                caps: caps.clone(),
            },
            Err(e) => {
                warn!(error = %format!("{e:#}"), "clock unavailable, not caching capabilities");
                return;
            }
        };
        let res = match serde_json::to_string(&entry) {
            Ok(s) => self.store.set(key, &s).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = res {
            warn!(key, error = %format!("{e:#}"), "capability cache write failed");
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            warn!(key, error = %format!("{e:#}"), "capability cache remove failed");
        }
    }

    /// Remove every cached snapshot.
    pub async fn clear(&self) -> eyre::Result<u64> {
        self.store.remove_prefix(CACHE_PREFIX).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kv::MemoryStore,
        types::{AccountKind, ExecutionMethod},
    };

    fn snapshot() -> CapabilitySnapshot {
        CapabilitySnapshot {
            chain_id: 8453,
            account_kind: AccountKind::Eoa,
            wallet_provider: WalletProvider::MetaMask,
            supports_delegated_bundling: true,
            supports_native_multi_call: false,
            preferred_method: ExecutionMethod::DelegatedBundle,
            protocol_version: None,
            max_batch_size: 10,
        }
    }

    #[test]
    fn key_lowercases_the_address() -> eyre::Result<()> {
        let acct: Address = "0xAbCdEf0000000000000000000000000000000001".parse()?;
        assert_eq!(
            cache_key(WalletProvider::MetaMask, acct, 8453),
            "swapbatch:caps:metamask:0xabcdef0000000000000000000000000000000001:eip155:8453"
        );
        Ok(())
    }

    #[tokio::test]
    async fn fresh_entries_are_served_and_cleared() -> eyre::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let cache = CapabilityCache::new(store, DEFAULT_CAPABILITY_TTL);
        cache.put("swapbatch:caps:k", &snapshot()).await;
        assert_eq!(cache.get("swapbatch:caps:k").await, Some(snapshot()));
        assert_eq!(cache.clear().await?, 1);
        assert_eq!(cache.get("swapbatch:caps:k").await, None);
        Ok(())
    }

    #[tokio::test]
    async fn entries_older_than_a_day_are_removed() -> eyre::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let day_and_a_bit = 25 * 60 * 60 * 1000;
        let stale = CachedCapabilities {
            cached_at: now_ms()? - day_and_a_bit,
            caps: snapshot(),
        };
        store.set("k", &serde_json::to_string(&stale)?).await?;
        let cache = CapabilityCache::new(Arc::clone(&store) as Arc<dyn KvStore>, DEFAULT_CAPABILITY_TTL);
        assert_eq!(cache.get("k").await, None, "stale entry treated as absent");
        assert!(store.is_empty(), "stale entry removed on read");
        Ok(())
    }

    #[tokio::test]
    async fn garbage_entries_are_removed() -> eyre::Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.set("k", "not json").await?;
        let cache = CapabilityCache::new(Arc::clone(&store) as Arc<dyn KvStore>, DEFAULT_CAPABILITY_TTL);
        assert_eq!(cache.get("k").await, None);
        assert!(store.is_empty(), "unreadable entry removed");
        Ok(())
    }
}
