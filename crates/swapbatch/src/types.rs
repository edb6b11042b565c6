use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `0xEeee…EEeE`, the "native asset" sentinel used by most aggregators.
pub const NATIVE_TOKEN_SENTINEL: Address = Address::new([0xee; 20]);

/// Native assets are addressed either as the zero address or the `0xEeee…` sentinel.
pub fn is_native_token(token: Address) -> bool {
    token == Address::ZERO || token == NATIVE_TOKEN_SENTINEL
}

/// A ready-to-submit transaction body for one route step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPayload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// A refreshed step transaction. `from_amount` is set when the routing service re-priced the
/// step and reports how much of the source token it now spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTransaction {
    pub payload: TxPayload,
    pub from_amount: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    pub id: String,
    pub tool: String,
    pub transaction: Option<TxPayload>,
    /// The routing service's own step object, sent back verbatim when refreshing.
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// A quoted swap route. Owned by the quote cache and shared as `Arc<Route>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub from_chain_id: u64,
    pub from_token: Address,
    pub from_amount: U256,
    pub to_chain_id: u64,
    pub to_token: Address,
    pub to_amount: U256,
    pub to_amount_min: U256,
    pub from_address: Address,
    pub to_address: Address,
    pub steps: Vec<RouteStep>,
}

impl Route {
    pub fn first_step(&self) -> Option<&RouteStep> {
        self.steps.first()
    }
}

/// One on-chain call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCall {
    pub to: Address,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl BatchCall {
    pub fn value_or_zero(&self) -> U256 {
        self.value.unwrap_or(U256::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Eoa,
    ContractAccount,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletProvider {
    MetaMask,
    Rabby,
    CoinbaseSmartWallet,
    Unknown,
}

impl WalletProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MetaMask => "metamask",
            Self::Rabby => "rabby",
            Self::CoinbaseSmartWallet => "coinbase_smart_wallet",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    DelegatedBundle,
    NativeMultiCall,
    Sequential,
    None,
}

impl ExecutionMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DelegatedBundle => "delegated_bundle",
            Self::NativeMultiCall => "native_multi_call",
            Self::Sequential => "sequential",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ExecutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a (wallet, account, chain) combination can do.
///
/// Re-detection replaces a snapshot wholesale; nothing mutates one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub chain_id: u64,
    pub account_kind: AccountKind,
    pub wallet_provider: WalletProvider,
    pub supports_delegated_bundling: bool,
    pub supports_native_multi_call: bool,
    pub preferred_method: ExecutionMethod,
    pub protocol_version: Option<String>,
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSummary {
    pub total_fee_wei: U256,
    pub gas_used: u64,
    pub transactions: usize,
}

/// Outcome of dispatching one chain's batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub method: ExecutionMethod,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tx_hashes: Vec<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_summary: Option<FeeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn native_sentinels_are_recognised() -> eyre::Result<()> {
        let sentinel = Address::from_str("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE")?;
        assert!(is_native_token(sentinel), "0xEeee sentinel is native");
        assert!(is_native_token(Address::ZERO), "zero address is native");
        let usdc = Address::from_str("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")?;
        assert!(!is_native_token(usdc), "erc20 is not native");
        Ok(())
    }

    #[test]
    fn snapshot_serializes_camel_case() -> eyre::Result<()> {
        let s = CapabilitySnapshot {
            chain_id: 8453,
            account_kind: AccountKind::Eoa,
            wallet_provider: WalletProvider::MetaMask,
            supports_delegated_bundling: true,
            supports_native_multi_call: false,
            preferred_method: ExecutionMethod::DelegatedBundle,
            protocol_version: None,
            max_batch_size: 10,
        };
        let v = serde_json::to_value(&s)?;
        assert_eq!(
            v.get("preferredMethod").and_then(|x| x.as_str()),
            Some("delegated_bundle")
        );
        assert_eq!(v.get("maxBatchSize").and_then(serde_json::Value::as_u64), Some(10));
        Ok(())
    }
}
