//! Wallet capability detection: provider fingerprint, account kind, bundling probes, and a
//! persistent snapshot cache.

pub mod account;
pub mod cache;
pub mod probes;
pub mod provider;

pub use account::{classify_bytecode, DELEGATION_DESIGNATOR};
pub use cache::CapabilityCache;
pub use provider::{fingerprint, max_batch_size};

use crate::{
    chains::ChainSet,
    types::{AccountKind, CapabilitySnapshot, ExecutionMethod, WalletProvider},
    wallet::WalletClient,
};
use alloy::primitives::Address;
use probes::{run_probes, ProbeContext, ProbeOutcome};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

pub fn select_method(kind: AccountKind, delegated: bool, native: bool) -> ExecutionMethod {
    if delegated && kind != AccountKind::ContractAccount {
        ExecutionMethod::DelegatedBundle
    } else if native {
        ExecutionMethod::NativeMultiCall
    } else {
        ExecutionMethod::Sequential
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Session {
    provider: WalletProvider,
    account: Option<Address>,
    chain_id: u64,
}

#[derive(Debug, Clone)]
struct Current {
    session: Session,
    snapshot: CapabilitySnapshot,
}

/// Detects and remembers what the connected wallet can do on a chain.
pub struct CapabilityDetector {
    wallet: RwLock<Arc<dyn WalletClient>>,
    chains: ChainSet,
    cache: CapabilityCache,
    versions: Vec<String>,
    current: RwLock<Option<Current>>,
}

impl std::fmt::Debug for CapabilityDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDetector")
            .field("chains", &self.chains)
            .field("cache", &self.cache)
            .field("versions", &self.versions)
            .finish_non_exhaustive()
    }
}

impl CapabilityDetector {
    pub fn new(
        wallet: Arc<dyn WalletClient>,
        chains: ChainSet,
        cache: CapabilityCache,
        versions: Vec<String>,
    ) -> Self {
        Self {
            wallet: RwLock::new(wallet),
            chains,
            cache,
            versions,
            current: RwLock::new(None),
        }
    }

    pub fn wallet(&self) -> Arc<dyn WalletClient> {
        Arc::clone(&self.wallet.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn chains(&self) -> &ChainSet {
        &self.chains
    }

    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }

    /// Swap the wallet client; the in-memory snapshot is dropped.
    pub fn replace_wallet(&self, wallet: Arc<dyn WalletClient>) {
        *self.wallet.write().unwrap_or_else(PoisonError::into_inner) = wallet;
        self.invalidate();
    }

    pub fn invalidate(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<CapabilitySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.snapshot.clone())
    }

    fn session_for(wallet: &dyn WalletClient, chain_id: u64) -> Session {
        Session {
            provider: fingerprint(&wallet.connector()),
            account: wallet.account(),
            chain_id,
        }
    }

    fn remember(&self, session: Session, snapshot: &CapabilitySnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Current {
            session,
            snapshot: snapshot.clone(),
        });
    }

    /// The held snapshot if it matches the current wallet, account and `chain_id`; otherwise
    /// detect one.
    pub async fn snapshot_for(&self, chain_id: u64) -> CapabilitySnapshot {
        let wallet = self.wallet();
        let session = Self::session_for(wallet.as_ref(), chain_id);
        let held = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|c| c.session == session)
            .map(|c| c.snapshot.clone());
        match held {
            Some(s) => s,
            None => self.detect_capabilities(Some(chain_id)).await,
        }
    }

    /// Detect capabilities for `target_chain` (defaults to the wallet's chain). Never fails.
    pub async fn detect_capabilities(&self, target_chain: Option<u64>) -> CapabilitySnapshot {
        let wallet = self.wallet();
        let chain_id = target_chain.unwrap_or_else(|| wallet.chain_id());
        let session = Self::session_for(wallet.as_ref(), chain_id);
        let provider = session.provider;
        let max = max_batch_size(provider);

        let Some(account) = session.account else {
            let snapshot = CapabilitySnapshot {
                chain_id,
                account_kind: AccountKind::Unknown,
                wallet_provider: provider,
                supports_delegated_bundling: false,
                supports_native_multi_call: false,
                preferred_method: ExecutionMethod::None,
                protocol_version: None,
                max_batch_size: max,
            };
            self.remember(session, &snapshot);
            return snapshot;
        };

        let key = cache::cache_key(provider, account, chain_id);
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!(key = %key, "capability cache hit");
            self.remember(session, &snapshot);
            return snapshot;
        }

        let chain = self.chains.get(chain_id);
        let account_kind = account::detect_account_kind(chain.as_deref(), account).await;

        let ctx = ProbeContext::new(wallet.as_ref(), account, chain_id, &self.versions);
        let supports_delegated_bundling = account_kind != AccountKind::ContractAccount
            && matches!(
                run_probes(&probes::delegated_bundling_probes(), &ctx).await,
                ProbeOutcome::Supported { .. }
            );
        let (supports_native_multi_call, protocol_version) =
            match run_probes(&probes::native_multi_call_probes(), &ctx).await {
                ProbeOutcome::Supported { version } => (true, version),
                ProbeOutcome::Unsupported | ProbeOutcome::Inconclusive => (false, None),
            };

        let snapshot = CapabilitySnapshot {
            chain_id,
            account_kind,
            wallet_provider: provider,
            supports_delegated_bundling,
            supports_native_multi_call,
            preferred_method: select_method(
                account_kind,
                supports_delegated_bundling,
                supports_native_multi_call,
            ),
            protocol_version,
            max_batch_size: max,
        };
        info!(
            chain_id,
            provider = %provider,
            account_kind = ?account_kind,
            method = %snapshot.preferred_method,
            version = ?snapshot.protocol_version,
            "detected wallet capabilities"
        );
        self.cache.put(&key, &snapshot).await;
        self.remember(session, &snapshot);
        snapshot
    }
}
