use crate::{
    chains::evm::EvmChain,
    config::WalletConfig,
    errors::WalletError,
    wallet::{eip5792, AuthorizationRequest, ConnectorInfo, WalletClient, WalletMethod},
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256},
    providers::{Provider as _, RootProvider},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use eyre::Context as _;
use serde_json::{json, Value};
use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
};

/// A wallet reachable over JSON-RPC: a wallet bridge, or a dev node with unlocked accounts.
pub struct RpcWallet {
    provider: RootProvider,
    connector: ConnectorInfo,
    account: Option<Address>,
    chain_id: AtomicU64,
    exposes_direct: bool,
    exposes_experimental: bool,
}

impl std::fmt::Debug for RpcWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWallet")
            .field("connector", &self.connector)
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl RpcWallet {
    pub async fn connect(cfg: &WalletConfig) -> eyre::Result<Self> {
        let Some(url) = cfg.rpc_url.as_deref() else {
            eyre::bail!("wallet.rpc_url is required when wallet.kind = \"rpc\"");
        };
        let provider = EvmChain::provider_for_url(url)?;
        let accounts = provider
            .get_accounts()
            .await
            .context("eth_accounts")?;
        let chain_id = provider.get_chain_id().await.context("eth_chainId")?;
        let connector = ConnectorInfo {
            id: cfg.connector_id.clone().unwrap_or_else(|| "rpc".into()),
            name: cfg
                .connector_name
                .clone()
                .unwrap_or_else(|| "JSON-RPC wallet".into()),
            is_metamask: cfg.is_metamask,
            is_rabby: cfg.is_rabby,
            is_coinbase_wallet: cfg.is_coinbase_wallet,
        };
        tracing::info!(
            connector = %connector.id,
            account = ?accounts.first(),
            chain_id,
            "connected rpc wallet"
        );
        Ok(Self {
            provider,
            connector,
            account: accounts.first().copied(),
            chain_id: AtomicU64::new(chain_id),
            exposes_direct: cfg.exposes_sign_authorization,
            exposes_experimental: cfg.exposes_experimental_sign_authorization,
        })
    }

    async fn raw(&self, method: &str, params: &Value) -> Result<Value, WalletError> {
        let params = serde_json::value::to_raw_value(params)
            .map_err(|e| WalletError::message(format!("encode {method} params: {e}")))?;
        let out = self
            .provider
            .raw_request_dyn(Cow::Owned(method.to_owned()), &params)
            .await
            .map_err(|e| match e.as_error_resp() {
                Some(payload) => WalletError::new(payload.code, payload.message.to_string()),
                None => WalletError::message(format!("{method}: {e}")),
            })?;
        serde_json::from_str(out.get())
            .map_err(|e| WalletError::message(format!("decode {method} result: {e}")))
    }
}

#[async_trait]
impl WalletClient for RpcWallet {
    fn connector(&self) -> ConnectorInfo {
        self.connector.clone()
    }

    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    fn exposes(&self, method: WalletMethod) -> bool {
        match method {
            WalletMethod::SignAuthorization => self.exposes_direct,
            WalletMethod::ExperimentalSignAuthorization => self.exposes_experimental,
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.raw(method, &params).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let v = self.raw("eth_sendTransaction", &json!([tx])).await?;
        serde_json::from_value(v)
            .map_err(|e| WalletError::message(format!("decode transaction hash: {e}")))
    }

    async fn sign_authorization(
        &self,
        req: AuthorizationRequest,
    ) -> Result<SignedAuthorization, WalletError> {
        let params = json!([{
            "chainId": eip5792::chain_id_hex(req.chain_id),
            "address": req.contract,
            "nonce": format!("{:#x}", req.nonce),
        }]);
        let v = self.raw(eip5792::SIGN_AUTHORIZATION, &params).await?;
        serde_json::from_value(v)
            .map_err(|e| WalletError::message(format!("decode signed authorization: {e}")))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.raw(
            "wallet_switchEthereumChain",
            &json!([{ "chainId": eip5792::chain_id_hex(chain_id) }]),
        )
        .await?;
        self.chain_id.store(chain_id, Ordering::SeqCst);
        Ok(())
    }
}
