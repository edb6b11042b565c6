mod common;

use alloy::primitives::Bytes;
use common::{
    account, atomic_wallet_handler, bare_wallet_handler, detector, memory_store, new_log,
    FakeChain, FakeWallet, BASE,
};
use serde_json::Value;
use std::sync::{atomic::Ordering, Arc};
use swapbatch::{
    capability::{cache::cache_key, cache::CachedCapabilities, DELEGATION_DESIGNATOR},
    errors::WalletError,
    kv::KvStore as _,
    types::{AccountKind, ExecutionMethod, WalletProvider},
    wallet::ConnectorInfo,
};

fn version_of(params: &Value) -> Option<&str> {
    params.get(0)?.get("version")?.as_str()
}

#[tokio::test]
async fn send_calls_version_is_negotiated_newest_first() {
    let log = new_log();
    let wallet = Arc::new(FakeWallet::new(
        BASE,
        &log,
        Box::new(|method: &str, params: &Value| -> Result<Value, WalletError> {
            match method {
                "wallet_sendCalls" if version_of(params) == Some("2.0.0") => {
                    Err(WalletError::new(-32602, "Version 2.0.0 is not supported"))
                }
                "wallet_sendCalls" => Err(WalletError::new(-32602, "invalid params: empty calls")),
                other => Err(WalletError::method_not_found(other)),
            }
        }),
    ));
    let detector = detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], memory_store());

    let caps = detector.detect_capabilities(None).await;

    assert_eq!(caps.chain_id, BASE);
    assert_eq!(caps.account_kind, AccountKind::Eoa);
    assert!(caps.supports_native_multi_call);
    assert!(!caps.supports_delegated_bundling);
    assert_eq!(caps.protocol_version.as_deref(), Some("1.0.0"));
    assert_eq!(caps.preferred_method, ExecutionMethod::NativeMultiCall);
    let tried: Vec<_> = wallet
        .requests_for("wallet_sendCalls")
        .iter()
        .filter_map(|p| version_of(p).map(str::to_owned))
        .collect();
    assert_eq!(tried, vec!["2.0.0", "1.0.0"]);
}

#[tokio::test]
async fn delegated_eoa_prefers_delegated_bundling() {
    let log = new_log();
    let wallet = Arc::new(
        FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE]))
            .exposing_sign_authorization()
            .with_connector(ConnectorInfo {
                id: "io.metamask".into(),
                name: "MetaMask".into(),
                is_metamask: true,
                ..ConnectorInfo::default()
            }),
    );
    let mut chain = FakeChain::new(BASE, &log);
    let mut code = DELEGATION_DESIGNATOR.to_vec();
    code.extend_from_slice(&[0x4c; 20]);
    chain.code = Bytes::from(code);
    let detector = detector(wallet, vec![chain], memory_store());

    let caps = detector.detect_capabilities(Some(BASE)).await;

    assert_eq!(caps.account_kind, AccountKind::Eoa);
    assert_eq!(caps.wallet_provider, WalletProvider::MetaMask);
    assert!(caps.supports_delegated_bundling);
    assert!(caps.supports_native_multi_call);
    assert_eq!(caps.protocol_version.as_deref(), Some("2.0.0"));
    assert_eq!(caps.preferred_method, ExecutionMethod::DelegatedBundle);
    assert_eq!(caps.max_batch_size, 10);
}

#[tokio::test]
async fn contract_account_without_native_support_falls_back_to_sequential() {
    let log = new_log();
    let wallet = Arc::new(
        FakeWallet::new(BASE, &log, bare_wallet_handler()).exposing_sign_authorization(),
    );
    let mut chain = FakeChain::new(BASE, &log);
    chain.code = Bytes::from(vec![0x60, 0x80, 0x60, 0x40]);
    let detector = detector(wallet, vec![chain], memory_store());

    let caps = detector.detect_capabilities(Some(BASE)).await;

    assert_eq!(caps.account_kind, AccountKind::ContractAccount);
    assert!(!caps.supports_delegated_bundling, "contract accounts cannot delegate");
    assert!(!caps.supports_native_multi_call);
    assert_eq!(caps.preferred_method, ExecutionMethod::Sequential);
}

#[tokio::test]
async fn missing_chain_client_leaves_account_kind_unknown() {
    let log = new_log();
    let wallet = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])));
    let detector = detector(wallet, vec![], memory_store());

    let caps = detector.detect_capabilities(Some(BASE)).await;

    assert_eq!(caps.account_kind, AccountKind::Unknown);
    assert_eq!(caps.preferred_method, ExecutionMethod::NativeMultiCall);
}

#[tokio::test]
async fn no_account_means_no_method() {
    let log = new_log();
    let wallet = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])).without_account());
    let detector = detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], memory_store());

    let caps = detector.detect_capabilities(None).await;

    assert_eq!(caps.preferred_method, ExecutionMethod::None);
    assert!(!caps.supports_native_multi_call);
    assert_eq!(wallet.request_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn provider_determines_batch_limit() {
    let log = new_log();
    let rabby = ConnectorInfo {
        id: "io.rabby".into(),
        name: "Rabby Wallet".into(),
        is_metamask: true,
        is_rabby: true,
        ..ConnectorInfo::default()
    };
    let wallet = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])).with_connector(rabby));
    let detector = detector(wallet, vec![FakeChain::new(BASE, &log)], memory_store());

    let caps = detector.detect_capabilities(None).await;

    assert_eq!(caps.wallet_provider, WalletProvider::Rabby);
    assert_eq!(caps.max_batch_size, 20);
}

#[tokio::test]
async fn cached_snapshot_is_reused_until_it_is_a_day_old() -> eyre::Result<()> {
    let log = new_log();
    let store = memory_store();
    let wallet = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])));

    let first = detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], Arc::clone(&store))
        .detect_capabilities(None)
        .await;
    let probes = wallet.request_count.load(Ordering::SeqCst);
    assert!(probes > 0, "first detection probes the wallet");

    let second = detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], Arc::clone(&store))
        .detect_capabilities(None)
        .await;
    assert_eq!(second, first);
    assert_eq!(
        wallet.request_count.load(Ordering::SeqCst),
        probes,
        "a fresh cache entry skips probing"
    );

    let key = cache_key(WalletProvider::Unknown, account(), BASE);
    let Some(raw) = store.get(&key).await? else {
        eyre::bail!("snapshot should be persisted under {key}");
    };
    let mut entry: CachedCapabilities = serde_json::from_str(&raw)?;
    entry.cached_at -= 25 * 60 * 60 * 1000;
    store.set(&key, &serde_json::to_string(&entry)?).await?;

    detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], Arc::clone(&store))
        .detect_capabilities(None)
        .await;
    assert!(
        wallet.request_count.load(Ordering::SeqCst) > probes,
        "a stale entry triggers re-detection"
    );
    Ok(())
}

#[tokio::test]
async fn held_snapshot_is_reused_for_the_same_session() {
    let log = new_log();
    let wallet = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])));
    let detector = detector(Arc::<FakeWallet>::clone(&wallet), vec![FakeChain::new(BASE, &log)], memory_store());

    let detected = detector.detect_capabilities(None).await;
    let probes = wallet.request_count.load(Ordering::SeqCst);
    let held = detector.snapshot_for(BASE).await;

    assert_eq!(held, detected);
    assert_eq!(wallet.request_count.load(Ordering::SeqCst), probes);

    detector.invalidate();
    assert!(detector.current().is_none());
}

#[tokio::test]
async fn replacing_the_wallet_drops_the_held_snapshot() {
    let log = new_log();
    let native = Arc::new(FakeWallet::new(BASE, &log, atomic_wallet_handler(&[BASE])));
    let detector = detector(native, vec![FakeChain::new(BASE, &log)], memory_store());
    let first = detector.detect_capabilities(None).await;
    assert_eq!(first.preferred_method, ExecutionMethod::NativeMultiCall);

    let coinbase = ConnectorInfo {
        id: "com.coinbase.wallet".into(),
        name: "Coinbase Wallet".into(),
        is_coinbase_wallet: true,
        ..ConnectorInfo::default()
    };
    let bare = Arc::new(FakeWallet::new(BASE, &log, bare_wallet_handler()).with_connector(coinbase));
    detector.replace_wallet(bare);
    assert!(detector.current().is_none(), "snapshot reset on wallet change");

    let second = detector.snapshot_for(BASE).await;
    assert_eq!(second.wallet_provider, WalletProvider::CoinbaseSmartWallet);
    assert_eq!(second.max_batch_size, 50);
    assert_eq!(second.preferred_method, ExecutionMethod::Sequential);
}
