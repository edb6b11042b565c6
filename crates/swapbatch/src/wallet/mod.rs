pub mod eip5792;
pub mod local;
pub mod rpc;

use crate::{
    chains::evm::EvmChain,
    config::{SwapbatchConfig, WalletKind},
    errors::WalletError,
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, Bytes, B256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{str::FromStr as _, sync::Arc};

/// Connector metadata and injected-provider flags, as reported by the wallet integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    pub id: String,
    pub name: String,
    pub is_metamask: bool,
    pub is_rabby: bool,
    pub is_coinbase_wallet: bool,
}

/// Optional wallet methods exposed outside the generic `request` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletMethod {
    SignAuthorization,
    ExperimentalSignAuthorization,
}

/// Parameters for an EIP-7702 authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub chain_id: u64,
    pub contract: Address,
    pub nonce: u64,
}

/// A connected wallet session: account, active chain and request channel.
#[async_trait]
pub trait WalletClient: Send + Sync {
    fn connector(&self) -> ConnectorInfo;

    fn account(&self) -> Option<Address>;

    /// Chain the wallet is currently on.
    fn chain_id(&self) -> u64;

    fn exposes(&self, method: WalletMethod) -> bool;

    /// Generic EIP-1193 style request.
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError>;

    async fn sign_authorization(
        &self,
        req: AuthorizationRequest,
    ) -> Result<SignedAuthorization, WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    async fn sign_typed_data(&self, typed_data: Value) -> Result<Bytes, WalletError> {
        let Some(account) = self.account() else {
            return Err(WalletError::message("no connected account"));
        };
        let v = self
            .request("eth_signTypedData_v4", json!([account, typed_data]))
            .await?;
        let s = v
            .as_str()
            .ok_or_else(|| WalletError::message("eth_signTypedData_v4 returned a non-string"))?;
        Bytes::from_str(s).map_err(|e| WalletError::message(format!("invalid signature hex: {e}")))
    }
}

/// Build the wallet selected by `config.toml`.
pub async fn connect(cfg: &SwapbatchConfig) -> eyre::Result<Arc<dyn WalletClient>> {
    match cfg.wallet.kind {
        WalletKind::Local => {
            let chains = cfg
                .chains_for_mode(cfg.network_mode)
                .iter()
                .filter_map(|name| EvmChain::from_config(name, cfg))
                .collect::<Vec<_>>();
            let w = local::LocalWallet::from_env(chains)?;
            Ok(Arc::new(w))
        }
        WalletKind::Rpc => {
            let w = rpc::RpcWallet::connect(&cfg.wallet).await?;
            Ok(Arc::new(w))
        }
    }
}
