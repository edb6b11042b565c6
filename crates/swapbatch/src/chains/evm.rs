use crate::{
    chains::{ChainClient, ReceiptSummary},
    config::SwapbatchConfig,
    retry::{try_all_with_backoff, BackoffConfig},
};
use alloy::{
    consensus::{SignableTransaction, Signed, TxEip1559, TxEip7702, TxEnvelope, TxLegacy},
    primitives::{Address, Bytes, Signature, TxKind, B256, U256},
    providers::{Provider as _, RootProvider},
    rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest},
    signers::{local::PrivateKeySigner, SignerSync as _},
    sol,
    sol_types::SolCall as _,
};
use async_trait::async_trait;
use eyre::Context as _;
use alloy::transports::http::reqwest::Client;
use std::{str::FromStr as _, time::Duration};
use tokio::time::{sleep, Instant};

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

type EvmProvider = RootProvider;

pub fn compute_eip1559_fees(base_fee: u128, gas_price: u128) -> (u128, u128) {
    // priority: max(1.5 gwei, gas_price / 10)
    // max_fee: base_fee * 2 + priority
    let min_priority: u128 = 1_500_000_000;
    let priority = std::cmp::max(min_priority, gas_price / 10);

    let mut max_fee = base_fee.saturating_mul(2).saturating_add(priority);
    let min_fee = base_fee.saturating_add(priority);
    if max_fee < min_fee {
        max_fee = min_fee;
    }
    (max_fee, priority)
}

/// Prefer EIP-1559 fees when the chain reports a base fee. Explicit fee fields are left alone.
pub fn apply_fee_policy(
    mut tx: TransactionRequest,
    base_fee: Option<u128>,
    gas_price: u128,
    from: Address,
    chain_id: u64,
) -> TransactionRequest {
    if tx.max_fee_per_gas.is_some()
        || tx.max_priority_fee_per_gas.is_some()
        || tx.gas_price.is_some()
    {
        return tx;
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if let Some(base_fee) = base_fee {
        let (max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(priority);
    } else if tx.authorization_list.is_some() {
        // Type-4 transactions have no legacy form.
        let (max_fee, priority) = compute_eip1559_fees(gas_price, gas_price);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(priority);
    } else {
        tx.gas_price = Some(gas_price);
    }
    tx
}

fn broadcast_err_is_ok(err: &eyre::Report) -> bool {
    let s = format!("{err:#}").to_lowercase();
    s.contains("already known")
        || s.contains("known transaction")
        || s.contains("already imported")
        || s.contains("already in mempool")
}

fn sign_envelope<T>(signer: &PrivateKeySigner, tx: T) -> eyre::Result<(TxEnvelope, B256)>
where
    T: SignableTransaction<Signature>,
    TxEnvelope: From<Signed<T>>,
{
    let sig = signer
        .sign_hash_sync(&tx.signature_hash())
        .context("sign transaction")?;
    let envelope = TxEnvelope::from(tx.into_signed(sig));
    let hash = *envelope.tx_hash();
    Ok((envelope, hash))
}

/// Sign a fully-populated request locally.
///
/// An authorization list selects type 4 (EIP-7702), `max_fee_per_gas` selects EIP-1559,
/// anything else is signed as legacy.
pub fn build_and_sign_tx(
    signer: &PrivateKeySigner,
    tx: &TransactionRequest,
) -> eyre::Result<(TxEnvelope, B256)> {
    let to = tx.to.unwrap_or(TxKind::Create);
    let value = tx.value.unwrap_or(U256::ZERO);
    let input = tx.input.clone().into_input().unwrap_or_default();
    let nonce = tx.nonce.unwrap_or(0);
    let gas_limit = tx.gas.unwrap_or(21_000);
    let chain_id = tx.chain_id.unwrap_or(1);
    let access_list = tx.access_list.clone().unwrap_or_default();
    let max_fee_per_gas = tx.max_fee_per_gas.unwrap_or(0);
    let max_priority_fee_per_gas = tx.max_priority_fee_per_gas.unwrap_or(0);

    match (&tx.authorization_list, tx.max_fee_per_gas) {
        (Some(authorization_list), _) => {
            let TxKind::Call(to) = to else {
                eyre::bail!("eip7702 transaction requires a `to` address");
            };
            sign_envelope(
                signer,
                TxEip7702 {
                    chain_id,
                    nonce,
                    gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to,
                    value,
                    access_list,
                    authorization_list: authorization_list.clone(),
                    input,
                },
            )
        }
        (None, Some(_)) => sign_envelope(
            signer,
            TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to,
                value,
                access_list,
                input,
            },
        ),
        (None, None) => sign_envelope(
            signer,
            TxLegacy {
                chain_id: tx.chain_id,
                nonce,
                gas_price: tx.gas_price.unwrap_or(0),
                gas_limit,
                to,
                value,
                input,
            },
        ),
    }
}

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

#[derive(Debug, Clone)]
pub struct EvmChain {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
    pub receipt_timeout: Duration,
}

impl EvmChain {
    pub fn new(name: &str, chain_id: u64, rpc_url: &str) -> Self {
        Self {
            name: name.to_owned(),
            chain_id,
            rpc_url: rpc_url.to_owned(),
            fallback_rpc_urls: vec![],
            receipt_timeout: Duration::from_secs(300),
        }
    }

    /// Look up `name` in the RPC table. Returns `None` when the chain has no RPC URL or id.
    pub fn from_config(name: &str, cfg: &SwapbatchConfig) -> Option<Self> {
        let rpc_url = cfg.rpc.evm_rpc_urls.get(name)?;
        let chain_id = *cfg.rpc.evm_chain_ids.get(name)?;
        Some(Self {
            name: name.to_owned(),
            chain_id,
            rpc_url: rpc_url.clone(),
            fallback_rpc_urls: cfg
                .rpc
                .evm_fallback_rpc_urls
                .get(name)
                .cloned()
                .unwrap_or_default(),
            receipt_timeout: Duration::from_secs(cfg.execution.receipt_timeout_seconds),
        })
    }

    pub(crate) fn provider_for_url(url: &str) -> eyre::Result<EvmProvider> {
        let u: reqwest::Url = url
            .parse()
            .with_context(|| format!("invalid rpc url: {url}"))?;
        let client = Client::builder()
            .timeout(DEFAULT_RPC_TIMEOUT)
            .connect_timeout(DEFAULT_RPC_CONNECT_TIMEOUT)
            .build()
            .context("build rpc http client")?;
        let http = alloy::transports::http::Http::with_client(client, u);
        let rpc_client = alloy::rpc::client::RpcClient::new(http, false);
        Ok(RootProvider::new(rpc_client))
    }

    fn all_rpc_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.fallback_rpc_urls.len());
        if !self.rpc_url.trim().is_empty() {
            urls.push(self.rpc_url.trim().to_owned());
        }
        for u in &self.fallback_rpc_urls {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            urls.push(t.to_owned());
        }
        urls
    }

    async fn with_fallback_and_backoff<T, Fut>(
        &self,
        context_label: &'static str,
        f: impl Fn(EvmProvider) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                let f = &f;
                async move {
                    let p = Self::provider_for_url(&u)?;
                    f(p).await
                }
            },
            context_label,
        )
        .await
    }

    pub async fn get_contract_code(&self, addr: Address) -> eyre::Result<Bytes> {
        self.with_fallback_and_backoff("get code", |p| async move {
            let code = p.get_code_at(addr).await.context("get code")?;
            Ok(code)
        })
        .await
    }

    pub async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> eyre::Result<U256> {
        self.with_fallback_and_backoff("erc20 allowance", |p| async move {
            let c = IERC20::new(token, &p);
            let v = c
                .allowance(owner, spender)
                .call()
                .await
                .context("erc20 allowance")?;
            Ok(v)
        })
        .await
    }

    pub async fn pending_nonce(&self, addr: Address) -> eyre::Result<u64> {
        self.with_fallback_and_backoff("get nonce", |p| async move {
            let n = p
                .get_transaction_count(addr)
                .pending()
                .await
                .context("get nonce")?;
            Ok(n)
        })
        .await
    }

    async fn pick_healthy_provider(&self) -> eyre::Result<EvmProvider> {
        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                async move {
                    let p = Self::provider_for_url(&u)?;
                    p.get_block_number().await.context("get block number")?;
                    Ok(p)
                }
            },
            "select rpc",
        )
        .await
    }

    /// Fill fees, nonce and gas, sign locally, then broadcast the same raw bytes across RPCs.
    pub async fn send_tx(
        &self,
        signer: &PrivateKeySigner,
        mut tx: TransactionRequest,
    ) -> eyre::Result<B256> {
        let provider = self.pick_healthy_provider().await?;
        let from = signer.address();

        tx.chain_id = Some(self.chain_id);
        if tx.from.is_none() {
            tx.from = Some(from);
        }

        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let base_fee = provider
                .get_block_by_number(BlockNumberOrTag::Pending)
                .await
                .ok()
                .flatten()
                .and_then(|b| b.header.base_fee_per_gas.map(u128::from));

            let gp = provider.get_gas_price().await.context("get gas price")?;
            tx = apply_fee_policy(tx, base_fee, gp, from, self.chain_id);
        }

        if tx.nonce.is_none() {
            let n = provider
                .get_transaction_count(from)
                .pending()
                .await
                .context("get nonce")?;
            tx.nonce = Some(n);
        }

        if tx.gas.is_none() {
            let gas = provider
                .estimate_gas(tx.clone())
                .await
                .context("estimate gas")?;
            // Small buffer for flaky estimators.
            let gas = gas.saturating_mul(120) / 100;
            tx.gas = Some(gas);
        }

        let (envelope, tx_hash) = build_and_sign_tx(signer, &tx).context("sign tx")?;
        let raw_bytes = alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope);

        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                let raw_bytes = raw_bytes.clone();
                async move {
                    let p = Self::provider_for_url(&u)?;
                    match p.send_raw_transaction(&raw_bytes).await {
                        Ok(_pending) => Ok(()),
                        Err(e) => {
                            let ae: eyre::Report = e.into();
                            if broadcast_err_is_ok(&ae) {
                                Ok(())
                            } else {
                                Err(ae).context("broadcast raw tx")
                            }
                        }
                    }
                }
            },
            "send transaction",
        )
        .await?;

        tracing::debug!(chain = %self.name, tx = %tx_hash, "broadcast transaction");
        Ok(tx_hash)
    }

    pub async fn get_tx_receipt(&self, tx: B256) -> eyre::Result<Option<TransactionReceipt>> {
        self.with_fallback_and_backoff("get tx receipt", |p| async move {
            let r = p
                .get_transaction_receipt(tx)
                .await
                .context("get transaction receipt")?;
            Ok(r)
        })
        .await
    }

    pub async fn wait_for_tx_receipt(
        &self,
        tx: B256,
        timeout: Duration,
    ) -> eyre::Result<TransactionReceipt> {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                eyre::bail!("timed out waiting for tx receipt");
            }
            if let Some(r) = self.get_tx_receipt(tx).await? {
                return Ok(r);
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    pub fn parse_address(s: &str) -> eyre::Result<Address> {
        Address::from_str(s.trim()).context("parse evm address")
    }
}

pub fn erc20_approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
    IERC20::approveCall { spender, amount }.abi_encode()
}

pub fn receipt_summary(r: &TransactionReceipt) -> ReceiptSummary {
    ReceiptSummary {
        tx_hash: r.transaction_hash,
        success: r.status(),
        gas_used: r.gas_used,
        effective_gas_price: r.effective_gas_price,
    }
}

#[async_trait]
impl ChainClient for EvmChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_code(&self, addr: Address) -> eyre::Result<Bytes> {
        self.get_contract_code(addr).await
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> eyre::Result<U256> {
        Self::erc20_allowance(self, token, owner, spender).await
    }

    async fn get_transaction_count(&self, addr: Address) -> eyre::Result<u64> {
        self.pending_nonce(addr).await
    }

    async fn wait_for_receipt(&self, tx: B256) -> eyre::Result<ReceiptSummary> {
        let r = self.wait_for_tx_receipt(tx, self.receipt_timeout).await?;
        Ok(receipt_summary(&r))
    }
}

/// Parse a decimal or `0x`-prefixed hex integer.
pub fn parse_u256(s: &str) -> eyre::Result<U256> {
    let t = s.trim();
    if let Some(h) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        if h.is_empty() {
            return Ok(U256::ZERO);
        }
        return U256::from_str_radix(h, 16).context("parse hex u256");
    }
    t.parse::<U256>().context("parse u256")
}
