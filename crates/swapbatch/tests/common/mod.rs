//! In-process fakes for the wallet, chain and routing collaborators.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Bytes, B256, U256},
    rpc::types::TransactionRequest,
    signers::{local::PrivateKeySigner, SignerSync as _},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use swapbatch::{
    capability::{CapabilityCache, CapabilityDetector},
    chains::{registry::ChainRegistry, ChainClient, ChainSet, ReceiptSummary},
    dispatch::Dispatcher,
    errors::WalletError,
    kv::{KvStore, MemoryStore},
    quote::{QuoteCache, QuoteRequest, RouteResolver, TokenSelection},
    routing::{RouteRequest, RoutingService},
    types::{Route, RouteStep, StepTransaction, TxPayload},
    wallet::{AuthorizationRequest, ConnectorInfo, WalletClient, WalletMethod},
};

pub const BASE: u64 = 8453;
pub const OPTIMISM: u64 = 10;
pub const ROUTER: Address = Address::repeat_byte(0x77);
pub const EXECUTOR: Address = Address::repeat_byte(0x4c);

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(vec![]))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn push(log: &Log, entry: String) {
    log.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
}

pub fn account() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn token(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, WalletError> + Send + Sync>;

/// A wallet that answers generic requests from a handler and records everything it is asked.
pub struct FakeWallet {
    pub connector: ConnectorInfo,
    pub account: Option<Address>,
    pub chain: AtomicU64,
    pub exposes_direct: bool,
    pub handler: Handler,
    pub log: Log,
    pub requests: Mutex<Vec<(String, Value)>>,
    pub sent: Mutex<Vec<TransactionRequest>>,
    pub authorizations: Mutex<Vec<AuthorizationRequest>>,
    pub send_error: Mutex<Option<WalletError>>,
    pub switch_error: Mutex<Option<WalletError>>,
    pub request_count: AtomicUsize,
    signer: PrivateKeySigner,
    next_hash: AtomicU64,
}

impl FakeWallet {
    pub fn new(chain: u64, log: &Log, handler: Handler) -> Self {
        Self {
            connector: ConnectorInfo::default(),
            account: Some(account()),
            chain: AtomicU64::new(chain),
            exposes_direct: false,
            handler,
            log: Arc::clone(log),
            requests: Mutex::new(vec![]),
            sent: Mutex::new(vec![]),
            authorizations: Mutex::new(vec![]),
            send_error: Mutex::new(None),
            switch_error: Mutex::new(None),
            request_count: AtomicUsize::new(0),
            signer: PrivateKeySigner::random(),
            next_hash: AtomicU64::new(1),
        }
    }

    pub fn with_connector(mut self, connector: ConnectorInfo) -> Self {
        self.connector = connector;
        self
    }

    pub fn without_account(mut self) -> Self {
        self.account = None;
        self
    }

    pub fn exposing_sign_authorization(mut self) -> Self {
        self.exposes_direct = true;
        self
    }

    pub fn fail_sends_with(&self, err: WalletError) {
        *self.send_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    pub fn fail_switches_with(&self, err: WalletError) {
        *self.switch_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

/// Every `wallet_*` method is unknown.
pub fn bare_wallet_handler() -> Handler {
    Box::new(|method: &str, _: &Value| -> Result<Value, WalletError> {
        Err(WalletError::method_not_found(method))
    })
}

/// Declares atomic support on `chains`; `wallet_sendCalls` returns a batch id.
pub fn atomic_wallet_handler(chains: &[u64]) -> Handler {
    let caps: serde_json::Map<String, Value> = chains
        .iter()
        .map(|c| (format!("{c:#x}"), json!({ "atomic": { "status": "supported" } })))
        .collect();
    let caps = Value::Object(caps);
    let counter = AtomicUsize::new(0);
    Box::new(move |method: &str, _: &Value| -> Result<Value, WalletError> {
        match method {
            "wallet_getCapabilities" => Ok(caps.clone()),
            "wallet_sendCalls" => {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "id": format!("batch-{n}") }))
            }
            other => Err(WalletError::method_not_found(other)),
        }
    })
}

#[async_trait]
impl WalletClient for FakeWallet {
    fn connector(&self) -> ConnectorInfo {
        self.connector.clone()
    }

    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> u64 {
        self.chain.load(Ordering::SeqCst)
    }

    fn exposes(&self, method: WalletMethod) -> bool {
        method == WalletMethod::SignAuthorization && self.exposes_direct
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        push(&self.log, format!("request:{method}:{}", self.chain_id()));
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method.to_owned(), params.clone()));
        (self.handler)(method, &params)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, WalletError> {
        if let Some(e) = self
            .send_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            push(&self.log, format!("send_failed:{}", self.chain_id()));
            return Err(e);
        }
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
        let hash = tx_hash(n);
        push(&self.log, format!("send:{}:{n}", self.chain_id()));
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(hash)
    }

    async fn sign_authorization(
        &self,
        req: AuthorizationRequest,
    ) -> Result<SignedAuthorization, WalletError> {
        self.authorizations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);
        let auth = Authorization {
            chain_id: U256::from(req.chain_id),
            address: req.contract,
            nonce: req.nonce,
        };
        let sig = self
            .signer
            .sign_hash_sync(&auth.signature_hash())
            .map_err(|e| WalletError::message(e.to_string()))?;
        Ok(auth.into_signed(sig))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if let Some(e) = self
            .switch_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            push(&self.log, format!("switch_failed:{chain_id}"));
            return Err(e);
        }
        push(&self.log, format!("switch:{chain_id}"));
        self.chain.store(chain_id, Ordering::SeqCst);
        Ok(())
    }
}

/// Hash the fake wallet returns for its nth submission.
pub fn tx_hash(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

/// A chain with fixed code, allowances and receipts.
pub struct FakeChain {
    pub id: u64,
    pub code: Bytes,
    pub nonce: u64,
    /// Allowance by token; tokens not listed have an unlimited allowance.
    pub allowances: HashMap<Address, U256>,
    pub allowance_fails: bool,
    pub receipts_succeed: bool,
    /// The nth submitted transaction (1-based) reverts.
    pub reverts_tx: Option<u64>,
    pub gas_used: u64,
    pub gas_price: u128,
    pub log: Log,
}

impl FakeChain {
    pub fn new(id: u64, log: &Log) -> Self {
        Self {
            id,
            code: Bytes::new(),
            nonce: 7,
            allowances: HashMap::new(),
            allowance_fails: false,
            receipts_succeed: true,
            reverts_tx: None,
            gas_used: 21_000,
            gas_price: 2_000_000_000,
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        self.id
    }

    async fn get_code(&self, _addr: Address) -> eyre::Result<Bytes> {
        Ok(self.code.clone())
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> eyre::Result<U256> {
        if self.allowance_fails {
            eyre::bail!("rpc unavailable");
        }
        Ok(self.allowances.get(&token).copied().unwrap_or(U256::MAX))
    }

    async fn get_transaction_count(&self, _addr: Address) -> eyre::Result<u64> {
        Ok(self.nonce)
    }

    async fn wait_for_receipt(&self, tx: B256) -> eyre::Result<ReceiptSummary> {
        let n = U256::from_be_bytes(tx.0);
        push(&self.log, format!("wait:{}:{n}", self.id));
        Ok(ReceiptSummary {
            tx_hash: tx,
            success: self.receipts_succeed && self.reverts_tx.map(U256::from) != Some(n),
            gas_used: self.gas_used,
            effective_gas_price: self.gas_price,
        })
    }
}

/// Swap calldata marker: the source token's repeated byte.
pub fn swap_data(token: Address) -> Bytes {
    Bytes::from(vec![0x5a, token.0[0]])
}

/// Routes every request through `ROUTER`, echoing the requested amount.
#[derive(Default)]
pub struct FakeRouting {
    pub calls: AtomicUsize,
    pub no_route: HashSet<Address>,
    pub failing: HashSet<Address>,
    /// Spend amount reported on step refresh, by source token.
    pub refreshed_amounts: HashMap<Address, U256>,
    pub delay: Option<Duration>,
}

impl FakeRouting {
    pub fn route_for(req: &RouteRequest) -> Route {
        Route {
            id: format!("route-{}-{:#x}-{}", req.from_chain_id, req.from_token, req.from_amount),
            from_chain_id: req.from_chain_id,
            from_token: req.from_token,
            from_amount: req.from_amount,
            to_chain_id: req.to_chain_id,
            to_token: req.to_token,
            to_amount: req.from_amount,
            to_amount_min: req.from_amount,
            from_address: req.from_address,
            to_address: req.to_address,
            steps: vec![RouteStep {
                id: "step-0".into(),
                tool: "fake".into(),
                transaction: Some(TxPayload {
                    to: ROUTER,
                    data: swap_data(req.from_token),
                    value: U256::ZERO,
                }),
                raw: json!({ "id": "step-0" }),
            }],
        }
    }
}

#[async_trait]
impl RoutingService for FakeRouting {
    async fn routes(&self, req: &RouteRequest) -> eyre::Result<Vec<Route>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.failing.contains(&req.from_token) {
            eyre::bail!("routing service unavailable");
        }
        if self.no_route.contains(&req.from_token) {
            return Ok(vec![]);
        }
        Ok(vec![Self::route_for(req)])
    }

    async fn step_transaction(&self, route: &Route) -> eyre::Result<Option<StepTransaction>> {
        Ok(route
            .first_step()
            .and_then(|s| s.transaction.clone())
            .map(|payload| StepTransaction {
                payload,
                from_amount: self.refreshed_amounts.get(&route.from_token).copied(),
            }))
    }
}

pub fn registry() -> ChainRegistry {
    ChainRegistry::default()
        .with_chain(BASE, "base", "Base")
        .with_chain(OPTIMISM, "optimism", "OP Mainnet")
}

pub fn versions() -> Vec<String> {
    vec!["2.0.0".into(), "1.0.0".into()]
}

pub fn detector(
    wallet: Arc<dyn WalletClient>,
    chains: Vec<FakeChain>,
    store: Arc<dyn KvStore>,
) -> Arc<CapabilityDetector> {
    let set = chains
        .into_iter()
        .fold(ChainSet::new(), |set, c| set.with(Arc::new(c)));
    Arc::new(CapabilityDetector::new(
        wallet,
        set,
        CapabilityCache::new(store, Duration::from_secs(24 * 60 * 60)),
        versions(),
    ))
}

pub fn memory_store() -> Arc<dyn KvStore> {
    Arc::new(MemoryStore::new())
}

pub fn dispatcher(detector: Arc<CapabilityDetector>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(detector, registry(), EXECUTOR, "2.0.0".into()))
}

pub fn resolver(routing: Arc<dyn RoutingService>) -> Arc<RouteResolver> {
    Arc::new(RouteResolver::new(routing, Arc::new(QuoteCache::default())))
}

pub fn request(chain: u64, from_token: Address, amount: u64, to_chain: u64) -> QuoteRequest {
    QuoteRequest {
        from_token: TokenSelection {
            chain_id: chain,
            address: from_token,
            amount: U256::from(amount),
        },
        to_chain_id: to_chain,
        to_token: token(0xdd),
        from_address: account(),
        to_address: account(),
        custom_amount: None,
    }
}
