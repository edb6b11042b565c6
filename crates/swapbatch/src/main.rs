#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use alloy::primitives::Address;
use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context as _;
use std::{str::FromStr as _, sync::Arc, time::Duration};
use swapbatch::{
    amount::parse_amount_arg,
    capability::{CapabilityCache, CapabilityDetector},
    chains::{registry::ChainRegistry, ChainSet},
    cli_output,
    config::{NetworkMode, SwapbatchConfig},
    db::Db,
    dispatch::Dispatcher,
    kv::{KvStore, MemoryStore},
    orchestrator::BatchSwapper,
    paths::SwapbatchPaths,
    quote::{QuoteCache, QuoteRequest, RouteResolver, TokenSelection},
    routing::lifi::LifiRouter,
    status::StatusReporter,
    store::ConfigStore,
    types::ExecutionMethod,
    wallet::{self, WalletClient},
};
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliNetworkMode {
    Mainnet,
    Testnet,
}

impl From<CliNetworkMode> for NetworkMode {
    fn from(v: CliNetworkMode) -> Self {
        match v {
            CliNetworkMode::Mainnet => Self::Mainnet,
            CliNetworkMode::Testnet => Self::Testnet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMethod {
    Delegated,
    Native,
    Sequential,
}

impl From<CliMethod> for ExecutionMethod {
    fn from(v: CliMethod) -> Self {
        match v {
            CliMethod::Delegated => Self::DelegatedBundle,
            CliMethod::Native => Self::NativeMultiCall,
            CliMethod::Sequential => Self::Sequential,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "swapbatch", version)]
struct Cli {
    /// Override config network mode for this invocation.
    #[arg(long, value_enum, global = true)]
    network: Option<CliNetworkMode>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved paths (useful for debugging).
    Paths,

    /// Print the effective configuration (API keys redacted).
    Config,

    /// Detect what the configured wallet can do on a chain.
    Capabilities {
        /// Chain name or id. Defaults to the wallet's current chain.
        #[arg(long)]
        chain: Option<String>,

        /// Ignore the persistent capability cache.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },

    /// Quote one or more swaps without executing them.
    Quote {
        /// `FROM_CHAIN:FROM_TOKEN:AMOUNT:TO_CHAIN:TO_TOKEN`, repeatable. AMOUNT is in base units
        /// unless `--decimals` is given.
        #[arg(long = "leg", required = true)]
        legs: Vec<String>,

        /// Decimals for UI amounts (applies to every leg).
        #[arg(long)]
        decimals: Option<u8>,

        /// Recipient on the destination chain. Defaults to the wallet account.
        #[arg(long)]
        to_address: Option<String>,
    },

    /// Quote and execute swaps, batching per source chain.
    Swap {
        #[arg(long = "leg", required = true)]
        legs: Vec<String>,

        #[arg(long)]
        decimals: Option<u8>,

        #[arg(long)]
        to_address: Option<String>,

        /// Force an execution method instead of the detected one.
        #[arg(long, value_enum)]
        method: Option<CliMethod>,

        /// Skip the confirmation prompt (required for non-interactive shells).
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Manage persisted caches.
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Remove every cached capability snapshot.
    Clear,
}

/// One parsed `--leg`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Leg {
    from_chain: String,
    from_token: Address,
    amount: String,
    to_chain: String,
    to_token: Address,
}

fn parse_leg(s: &str) -> eyre::Result<Leg> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [from_chain, from_token, amount, to_chain, to_token] = parts.as_slice() else {
        eyre::bail!("leg must be FROM_CHAIN:FROM_TOKEN:AMOUNT:TO_CHAIN:TO_TOKEN, got {s:?}");
    };
    Ok(Leg {
        from_chain: (*from_chain).to_owned(),
        from_token: Address::from_str(from_token).context("parse from token")?,
        amount: (*amount).to_owned(),
        to_chain: (*to_chain).to_owned(),
        to_token: Address::from_str(to_token).context("parse to token")?,
    })
}

fn init_logging(paths: &SwapbatchPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("swapbatch.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn open_store(paths: &SwapbatchPaths) -> Arc<dyn KvStore> {
    match Db::open(paths).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "capability cache unavailable, using memory");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Wired-up services for one CLI invocation.
struct Engine {
    cfg: SwapbatchConfig,
    registry: ChainRegistry,
    wallet: Arc<dyn WalletClient>,
    detector: Arc<CapabilityDetector>,
    resolver: Arc<RouteResolver>,
}

impl Engine {
    async fn build(cfg: SwapbatchConfig, paths: &SwapbatchPaths) -> eyre::Result<Self> {
        let registry = ChainRegistry::from_rpc_config(&cfg.rpc);
        let wallet = wallet::connect(&cfg).await?;
        let cache = CapabilityCache::new(
            open_store(paths).await,
            Duration::from_secs(cfg.cache.capability_ttl_seconds),
        );
        let detector = Arc::new(CapabilityDetector::new(
            Arc::clone(&wallet),
            ChainSet::from_config(&cfg),
            cache,
            cfg.execution.multicall_versions.clone(),
        ));
        let resolver = Arc::new(RouteResolver::new(
            Arc::new(LifiRouter::new(&cfg.http)?),
            Arc::new(QuoteCache::new(Duration::from_secs(
                cfg.cache.quote_ttl_seconds,
            ))),
        ));
        Ok(Self {
            cfg,
            registry,
            wallet,
            detector,
            resolver,
        })
    }

    fn chain_id(&self, name_or_id: &str) -> eyre::Result<u64> {
        self.registry
            .resolve(name_or_id)
            .map(|c| c.id)
            .ok_or_else(|| eyre::eyre!("unknown chain {name_or_id:?}"))
    }

    fn requests(
        &self,
        legs: &[String],
        decimals: Option<u8>,
        to_address: Option<&str>,
    ) -> eyre::Result<Vec<QuoteRequest>> {
        let from = self
            .wallet
            .account()
            .ok_or_else(|| eyre::eyre!("wallet has no account"))?;
        let to = to_address
            .map(Address::from_str)
            .transpose()
            .context("parse --to-address")?
            .unwrap_or(from);
        legs.iter()
            .map(|s| {
                let leg = parse_leg(s)?;
                Ok(QuoteRequest {
                    from_token: TokenSelection {
                        chain_id: self.chain_id(&leg.from_chain)?,
                        address: leg.from_token,
                        amount: parse_amount_arg(&leg.amount, decimals)?,
                    },
                    to_chain_id: self.chain_id(&leg.to_chain)?,
                    to_token: leg.to_token,
                    from_address: from,
                    to_address: to,
                    custom_amount: None,
                })
            })
            .collect()
    }
}

fn redacted_config(cfg: &SwapbatchConfig) -> SwapbatchConfig {
    let mut c = cfg.clone();
    if c.http.routing_api_key.is_some() {
        c.http.routing_api_key = Some("<redacted>".into());
    }
    c
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = SwapbatchPaths::discover()?;
    paths.ensure_private_dirs().context("create swapbatch dirs")?;
    let _log_guard = init_logging(&paths);

    let mut cfg = ConfigStore::new(&paths).load_or_init_default()?;
    if let Some(n) = cli.network {
        cfg.network_mode = n.into();
    }

    match cli.cmd {
        Command::Paths => cli_output::print_json(&serde_json::json!({
            "config_dir": paths.config_dir,
            "data_dir": paths.data_dir,
            "log_file": paths.log_file,
            "cache_db": paths.cache_db_file(),
        })),
        Command::Config => cli_output::print_json(
            &serde_json::to_value(redacted_config(&cfg)).context("serialize config")?,
        ),
        Command::Capabilities { chain, refresh } => {
            let engine = Engine::build(cfg, &paths).await?;
            let chain_id = chain.as_deref().map(|c| engine.chain_id(c)).transpose()?;
            if refresh {
                engine.detector.cache().clear().await?;
            }
            let snapshot = engine.detector.detect_capabilities(chain_id).await;
            cli_output::print_json(&serde_json::to_value(snapshot).context("serialize caps")?)
        }
        Command::Quote {
            legs,
            decimals,
            to_address,
        } => {
            let engine = Engine::build(cfg, &paths).await?;
            let reqs = engine.requests(&legs, decimals, to_address.as_deref())?;
            let quotes = engine.resolver.quote_all(&reqs).await;
            let out: Vec<serde_json::Value> = reqs
                .iter()
                .zip(quotes)
                .map(|(r, q)| match q {
                    Some(q) => serde_json::json!({
                        "token": r.token_key(),
                        "route_id": q.route.id,
                        "from_amount": q.route.from_amount.to_string(),
                        "to_amount": q.route.to_amount.to_string(),
                        "to_amount_min": q.route.to_amount_min.to_string(),
                        "steps": q.route.steps.iter().map(|s| s.tool.clone()).collect::<Vec<_>>(),
                    }),
                    None => serde_json::json!({ "token": r.token_key(), "route": null }),
                })
                .collect();
            cli_output::print_json(&serde_json::Value::Array(out))
        }
        Command::Swap {
            legs,
            decimals,
            to_address,
            method,
            yes,
        } => {
            let engine = Engine::build(cfg, &paths).await?;
            let reqs = engine.requests(&legs, decimals, to_address.as_deref())?;
            cli_output::confirm_swap_or_bail(
                yes,
                &format!("About to execute {} swap(s) from {:?}.", reqs.len(), engine.wallet.account()),
            )?;

            let dispatcher = Arc::new(Dispatcher::from_config(
                Arc::clone(&engine.detector),
                &engine.cfg,
            )?);
            let status = Arc::new(StatusReporter::new());
            let mut watcher = status.subscribe();
            let printer = tokio::spawn(async move {
                while watcher.changed().await.is_ok() {
                    let s = watcher.borrow_and_update().clone();
                    cli_output::print_status(&s);
                }
            });

            let mut swapper = BatchSwapper::new(
                Arc::clone(&engine.resolver),
                dispatcher,
                Arc::clone(&status),
                Duration::from_millis(engine.cfg.execution.chain_switch_settle_ms),
            )
            .with_progress(Arc::new(cli_output::print_progress));
            if let Some(m) = method {
                swapper = swapper.with_force_method(m.into());
            }
            let outcome = swapper.execute(&reqs).await;
            drop(swapper);
            drop(status);
            let _joined = printer.await;

            let results = match outcome {
                Ok(results) => results,
                Err(e) => {
                    if let Some(confirmed) = e.confirmed() {
                        cli_output::print_results(std::slice::from_ref(confirmed), &engine.registry);
                    }
                    eyre::bail!("{} ({})", e, e.code());
                }
            };
            cli_output::print_results(&results, &engine.registry);
            cli_output::print_json(&serde_json::to_value(&results).context("serialize results")?)
        }
        Command::Cache { cmd } => match cmd {
            CacheCommand::Clear => {
                let store = open_store(&paths).await;
                let removed = CapabilityCache::new(store, Duration::ZERO).clear().await?;
                cli_output::print_json(&serde_json::json!({ "removed": removed }))
            }
        },
    }
}
