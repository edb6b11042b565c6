use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CREATE2-deployed `Simple7702Account`; same address on every supported chain.
pub const DEFAULT_BATCH_EXECUTOR: &str = "0x4Cd241E8d1510e30b2076397afc7508Ae59C66c9";
pub const DEFAULT_ROUTING_BASE_URL: &str = "https://li.quest/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Routing service base URL (LI.FI-compatible `/advanced/routes` + `/advanced/stepTransaction`).
    pub routing_base_url: String,
    /// Optional routing API key (`x-lifi-api-key`). Keyless usage is rate limited.
    pub routing_api_key: Option<String>,
    /// Integrator tag forwarded with route requests.
    pub routing_integrator: String,
    /// Max slippage forwarded with route requests, in basis points.
    pub slippage_bps: u32,
    /// HTTP timeout for routing requests (seconds).
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            routing_base_url: DEFAULT_ROUTING_BASE_URL.into(),
            routing_api_key: None,
            routing_integrator: "swapbatch".into(),
            slippage_bps: 50,
            timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Private key held by this process (`SWAPBATCH_PRIVATE_KEY`).
    #[default]
    Local,
    /// An external wallet reachable over JSON-RPC (wallet bridge, dev node with unlocked accounts).
    Rpc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub kind: WalletKind,
    /// JSON-RPC endpoint for `kind = "rpc"`.
    pub rpc_url: Option<String>,
    /// Connector metadata used for provider fingerprinting (`kind = "rpc"`).
    pub connector_id: Option<String>,
    pub connector_name: Option<String>,
    pub is_metamask: bool,
    pub is_rabby: bool,
    pub is_coinbase_wallet: bool,
    /// Methods the wallet exposes directly rather than through `request`.
    pub exposes_sign_authorization: bool,
    pub exposes_experimental_sign_authorization: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Route quote TTL (seconds).
    pub quote_ttl_seconds: u64,
    /// Capability snapshot TTL (seconds).
    pub capability_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl_seconds: 2 * 60,
            capability_ttl_seconds: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotingConfig {
    /// Quiet period before a debounced refresh actually fetches.
    pub debounce_ms: u64,
    /// Minimum time a token stays in "loading" before its quote is applied.
    pub min_loading_ms: u64,
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_loading_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Delegation target for EIP-7702 bundles.
    pub batch_executor: String,
    /// `wallet_sendCalls` versions to negotiate, newest first.
    pub multicall_versions: Vec<String>,
    /// Pause after a chain switch before building calls for the new chain.
    pub chain_switch_settle_ms: u64,
    /// Receipt polling ceiling on the chain RPC (seconds).
    pub receipt_timeout_seconds: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_executor: DEFAULT_BATCH_EXECUTOR.into(),
            multicall_versions: vec!["2.0.0".into(), "1.0.0".into()],
            chain_switch_settle_ms: 1_000,
            receipt_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// EVM RPC endpoints keyed by chain name.
    pub evm_rpc_urls: BTreeMap<String, String>,
    /// EVM fallback RPC endpoints keyed by chain name.
    pub evm_fallback_rpc_urls: BTreeMap<String, Vec<String>>,
    /// EVM chain IDs keyed by chain name.
    pub evm_chain_ids: BTreeMap<String, u64>,
    /// Human-readable chain names keyed by chain name, used in status and error text.
    pub evm_display_names: BTreeMap<String, String>,
}

/// A single EVM chain definition used by the table-driven [`RpcConfig::default()`].
struct EvmChainDef {
    name: &'static str,
    display_name: &'static str,
    rpc_url: &'static str,
    chain_id: u64,
    fallbacks: &'static [&'static str],
}

fn populate_evm_chains(table: &[EvmChainDef], rpc: &mut RpcConfig) {
    for def in table {
        rpc.evm_rpc_urls.insert(def.name.into(), def.rpc_url.into());
        rpc.evm_chain_ids.insert(def.name.into(), def.chain_id);
        rpc.evm_display_names
            .insert(def.name.into(), def.display_name.into());
        rpc.evm_fallback_rpc_urls.insert(
            def.name.into(),
            def.fallbacks.iter().map(|&s| s.into()).collect(),
        );
    }
}

const EVM_MAINNETS: &[EvmChainDef] = &[
    EvmChainDef {
        name: "ethereum",
        display_name: "Ethereum",
        rpc_url: "https://eth.llamarpc.com",
        chain_id: 1,
        fallbacks: &[
            "https://ethereum-rpc.publicnode.com",
            "https://rpc.ankr.com/eth",
            "https://cloudflare-eth.com",
        ],
    },
    EvmChainDef {
        name: "base",
        display_name: "Base",
        rpc_url: "https://base.llamarpc.com",
        chain_id: 8453,
        fallbacks: &[
            "https://mainnet.base.org",
            "https://base-rpc.publicnode.com",
        ],
    },
    EvmChainDef {
        name: "arbitrum",
        display_name: "Arbitrum One",
        rpc_url: "https://arbitrum.llamarpc.com",
        chain_id: 42161,
        fallbacks: &[
            "https://arb1.arbitrum.io/rpc",
            "https://arbitrum-rpc.publicnode.com",
        ],
    },
    EvmChainDef {
        name: "optimism",
        display_name: "OP Mainnet",
        rpc_url: "https://optimism.llamarpc.com",
        chain_id: 10,
        fallbacks: &[
            "https://mainnet.optimism.io",
            "https://optimism-rpc.publicnode.com",
        ],
    },
    EvmChainDef {
        name: "polygon",
        display_name: "Polygon",
        rpc_url: "https://polygon.llamarpc.com",
        chain_id: 137,
        fallbacks: &[
            "https://polygon-rpc.com",
            "https://polygon-bor-rpc.publicnode.com",
        ],
    },
    EvmChainDef {
        name: "bnb",
        display_name: "BNB Smart Chain",
        rpc_url: "https://bsc.llamarpc.com",
        chain_id: 56,
        fallbacks: &[
            "https://bsc-dataseed.binance.org",
            "https://bsc-rpc.publicnode.com",
        ],
    },
    EvmChainDef {
        name: "avalanche",
        display_name: "Avalanche",
        rpc_url: "https://avalanche-c-chain.llamarpc.com",
        chain_id: 43114,
        fallbacks: &[
            "https://api.avax.network/ext/bc/C/rpc",
            "https://avalanche-c-chain-rpc.publicnode.com",
        ],
    },
];

const EVM_TESTNETS: &[EvmChainDef] = &[
    EvmChainDef {
        name: "sepolia",
        display_name: "Sepolia",
        rpc_url: "https://rpc.sepolia.org",
        chain_id: 11_155_111,
        fallbacks: &["https://ethereum-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "base-sepolia",
        display_name: "Base Sepolia",
        rpc_url: "https://sepolia.base.org",
        chain_id: 84532,
        fallbacks: &["https://base-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "arbitrum-sepolia",
        display_name: "Arbitrum Sepolia",
        rpc_url: "https://sepolia-rollup.arbitrum.io/rpc",
        chain_id: 421_614,
        fallbacks: &["https://arbitrum-sepolia-rpc.publicnode.com"],
    },
    EvmChainDef {
        name: "optimism-sepolia",
        display_name: "OP Sepolia",
        rpc_url: "https://sepolia.optimism.io",
        chain_id: 11_155_420,
        fallbacks: &["https://optimism-sepolia-rpc.publicnode.com"],
    },
];

impl Default for RpcConfig {
    fn default() -> Self {
        let mut rpc = Self {
            evm_rpc_urls: BTreeMap::new(),
            evm_fallback_rpc_urls: BTreeMap::new(),
            evm_chain_ids: BTreeMap::new(),
            evm_display_names: BTreeMap::new(),
        };
        populate_evm_chains(EVM_MAINNETS, &mut rpc);
        populate_evm_chains(EVM_TESTNETS, &mut rpc);
        rpc
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapbatchConfig {
    pub network_mode: NetworkMode,
    pub rpc: RpcConfig,
    pub http: HttpConfig,
    pub wallet: WalletConfig,
    pub cache: CacheConfig,
    pub quoting: QuotingConfig,
    pub execution: ExecutionConfig,
}

impl SwapbatchConfig {
    /// Chain names available in `mode`, in table order.
    pub fn chains_for_mode(&self, mode: NetworkMode) -> Vec<String> {
        self.rpc
            .evm_rpc_urls
            .keys()
            .filter(|k| is_evm_testnet_chain_name(k) == (mode == NetworkMode::Testnet))
            .cloned()
            .collect()
    }
}

pub fn is_evm_testnet_chain_name(name: &str) -> bool {
    let n = name.trim().to_lowercase();
    n.contains("testnet")
        || n.contains("sepolia")
        || n.contains("goerli")
        || n.contains("holesky")
        || n.contains("amoy")
        || n.contains("fuji")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_for_mode_splits_mainnets_and_testnets() {
        let cfg = SwapbatchConfig::default();
        let mainnet = cfg.chains_for_mode(NetworkMode::Mainnet);
        assert!(mainnet.contains(&"base".to_owned()), "base is a mainnet");
        assert!(!mainnet.contains(&"sepolia".to_owned()), "sepolia is not");
        let testnet = cfg.chains_for_mode(NetworkMode::Testnet);
        assert!(testnet.contains(&"base-sepolia".to_owned()), "base-sepolia is a testnet");
        assert!(!testnet.contains(&"ethereum".to_owned()), "ethereum is not");
    }

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = SwapbatchConfig::default();
        assert_eq!(cfg.cache.quote_ttl_seconds, 120);
        assert_eq!(cfg.cache.capability_ttl_seconds, 86_400);
        assert_eq!(
            cfg.execution.multicall_versions,
            vec!["2.0.0".to_owned(), "1.0.0".to_owned()]
        );
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() -> eyre::Result<()> {
        let cfg: SwapbatchConfig = toml::from_str(
            "[http]\nrouting_api_key = \"k\"\n[wallet]\nkind = \"rpc\"\nis_metamask = true\n",
        )?;
        assert_eq!(cfg.http.routing_api_key.as_deref(), Some("k"));
        assert_eq!(cfg.http.routing_base_url, DEFAULT_ROUTING_BASE_URL);
        assert_eq!(cfg.wallet.kind, WalletKind::Rpc);
        assert!(cfg.wallet.is_metamask, "flag parsed");
        assert_eq!(cfg.rpc.evm_chain_ids.get("base"), Some(&8453));
        Ok(())
    }
}
