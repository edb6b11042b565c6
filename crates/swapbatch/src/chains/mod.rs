pub mod evm;
pub mod registry;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

/// The parts of a mined receipt the engine reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl ReceiptSummary {
    /// `gas_used × effective_gas_price`.
    pub fn fee_wei(&self) -> U256 {
        U256::from(self.gas_used).saturating_mul(U256::from(self.effective_gas_price))
    }
}

/// Read access to one chain, plus receipt waiting.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;
    async fn get_code(&self, addr: Address) -> eyre::Result<Bytes>;
    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> eyre::Result<U256>;
    async fn get_transaction_count(&self, addr: Address) -> eyre::Result<u64>;
    async fn wait_for_receipt(&self, tx: B256) -> eyre::Result<ReceiptSummary>;
}

/// Chain clients keyed by chain id.
#[derive(Clone, Default)]
pub struct ChainSet {
    clients: HashMap<u64, Arc<dyn ChainClient>>,
}

impl std::fmt::Debug for ChainSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ChainSet").field("chain_ids", &ids).finish()
    }
}

impl ChainSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: Arc<dyn ChainClient>) {
        self.clients.insert(client.chain_id(), client);
    }

    pub fn with(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.insert(client);
        self
    }

    pub fn get(&self, chain_id: u64) -> Option<Arc<dyn ChainClient>> {
        self.clients.get(&chain_id).map(Arc::clone)
    }

    /// Build alloy-backed clients for every chain of the configured network mode.
    pub fn from_config(cfg: &crate::config::SwapbatchConfig) -> Self {
        let mut out = Self::new();
        for name in cfg.chains_for_mode(cfg.network_mode) {
            if let Some(chain) = evm::EvmChain::from_config(&name, cfg) {
                out.insert(Arc::new(chain));
            }
        }
        out
    }
}
