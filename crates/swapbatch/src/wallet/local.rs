use crate::{
    chains::evm::EvmChain,
    errors::WalletError,
    wallet::{AuthorizationRequest, ConnectorInfo, WalletClient, WalletMethod},
};
use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Bytes, B256, U256},
    rpc::types::TransactionRequest,
    signers::{local::PrivateKeySigner, SignerSync as _},
};
use async_trait::async_trait;
use eyre::Context as _;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

/// EIP-3085 "unrecognized chain".
const UNRECOGNIZED_CHAIN: i64 = 4902;

/// A private-key wallet that signs in-process and broadcasts through [`EvmChain`].
#[derive(Debug)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    chains: HashMap<u64, EvmChain>,
    current: AtomicU64,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, chains: Vec<EvmChain>) -> Self {
        let first = chains.first().map_or(1, |c| c.chain_id);
        Self {
            signer,
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
            current: AtomicU64::new(first),
        }
    }

    /// Read the key from `SWAPBATCH_PRIVATE_KEY` (hex, with or without `0x`).
    pub fn from_env(chains: Vec<EvmChain>) -> eyre::Result<Self> {
        let raw = std::env::var("SWAPBATCH_PRIVATE_KEY")
            .context("SWAPBATCH_PRIVATE_KEY is not set (or use wallet.kind = \"rpc\")")?;
        let signer: PrivateKeySigner = raw
            .trim()
            .parse()
            .context("parse SWAPBATCH_PRIVATE_KEY")?;
        Ok(Self::new(signer, chains))
    }

    fn active_chain(&self) -> Result<&EvmChain, WalletError> {
        let id = self.current.load(Ordering::SeqCst);
        self.chains
            .get(&id)
            .ok_or_else(|| WalletError::new(UNRECOGNIZED_CHAIN, format!("no rpc for chain {id}")))
    }
}

#[async_trait]
impl WalletClient for LocalWallet {
    fn connector(&self) -> ConnectorInfo {
        ConnectorInfo {
            id: "local".into(),
            name: "Local signer".into(),
            ..ConnectorInfo::default()
        }
    }

    fn account(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    fn chain_id(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    fn exposes(&self, method: WalletMethod) -> bool {
        matches!(method, WalletMethod::SignAuthorization)
    }

    async fn request(&self, method: &str, _params: Value) -> Result<Value, WalletError> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.signer.address()])),
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id()))),
            other => Err(WalletError::method_not_found(other)),
        }
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        let chain = self.active_chain()?;
        chain
            .send_tx(&self.signer, tx)
            .await
            .map_err(WalletError::from)
    }

    async fn sign_authorization(
        &self,
        req: AuthorizationRequest,
    ) -> Result<SignedAuthorization, WalletError> {
        let auth = Authorization {
            chain_id: U256::from(req.chain_id),
            address: req.contract,
            nonce: req.nonce,
        };
        let sig = self
            .signer
            .sign_hash_sync(&auth.signature_hash())
            .map_err(|e| WalletError::message(format!("sign authorization: {e}")))?;
        Ok(auth.into_signed(sig))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if !self.chains.contains_key(&chain_id) {
            return Err(WalletError::new(
                UNRECOGNIZED_CHAIN,
                format!("unrecognized chain id {chain_id}"),
            ));
        }
        self.current.store(chain_id, Ordering::SeqCst);
        tracing::debug!(chain_id, "local wallet switched chain");
        Ok(())
    }

    async fn sign_typed_data(&self, typed_data: Value) -> Result<Bytes, WalletError> {
        let typed: TypedData = serde_json::from_value(typed_data)
            .map_err(|e| WalletError::message(format!("invalid typed data: {e}")))?;
        let hash = typed
            .eip712_signing_hash()
            .map_err(|e| WalletError::message(format!("typed data hash: {e}")))?;
        let sig = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::message(format!("sign typed data: {e}")))?;
        Ok(Bytes::from(sig.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> LocalWallet {
        LocalWallet::new(
            PrivateKeySigner::random(),
            vec![
                EvmChain::new("base", 8453, "http://127.0.0.1:1"),
                EvmChain::new("optimism", 10, "http://127.0.0.1:1"),
            ],
        )
    }

    #[tokio::test]
    async fn wallet_rpc_methods_are_not_found() {
        let w = wallet();
        let err = w
            .request("wallet_getCapabilities", json!([]))
            .await
            .err();
        assert!(
            err.is_some_and(|e| e.is_method_not_found()),
            "local signer has no eip-5792 surface"
        );
    }

    #[tokio::test]
    async fn switch_chain_rejects_unknown_chains() -> eyre::Result<()> {
        let w = wallet();
        assert_eq!(w.chain_id(), 8453);
        w.switch_chain(10).await?;
        assert_eq!(w.chain_id(), 10);
        let err = w.switch_chain(137).await.err();
        assert_eq!(err.and_then(|e| e.code), Some(UNRECOGNIZED_CHAIN));
        assert_eq!(w.chain_id(), 10, "failed switch keeps the current chain");
        Ok(())
    }

    #[tokio::test]
    async fn authorization_recovers_to_signer() -> eyre::Result<()> {
        let w = wallet();
        let signed = w
            .sign_authorization(AuthorizationRequest {
                chain_id: 8453,
                contract: Address::repeat_byte(0x4c),
                nonce: 3,
            })
            .await?;
        assert_eq!(signed.recover_authority()?, w.signer.address());
        assert_eq!(signed.nonce, 3);
        Ok(())
    }
}
