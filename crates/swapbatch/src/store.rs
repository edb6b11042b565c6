use crate::{
    config::{NetworkMode, SwapbatchConfig, WalletKind},
    paths::SwapbatchPaths,
};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

fn parse_network_mode_env(s: &str) -> Option<NetworkMode> {
    match s.trim().to_lowercase().as_str() {
        "mainnet" | "main" | "prod" | "production" => Some(NetworkMode::Mainnet),
        "testnet" | "test" | "dev" | "devnet" => Some(NetworkMode::Testnet),
        _ => None,
    }
}

/// Apply `SWAPBATCH_*` environment overrides on top of the file config.
fn apply_env_overrides(cfg: &mut SwapbatchConfig) {
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("SWAPBATCH_ROUTING_BASE_URL", |v| {
        v.clone_into(&mut cfg.http.routing_base_url);
    });
    apply_env("SWAPBATCH_ROUTING_API_KEY", |v| {
        cfg.http.routing_api_key = Some(v.to_owned());
    });
    apply_env("SWAPBATCH_WALLET_RPC_URL", |v| {
        cfg.wallet.rpc_url = Some(v.to_owned());
        cfg.wallet.kind = WalletKind::Rpc;
    });
    apply_env("SWAPBATCH_NETWORK_MODE", |v| {
        if let Some(m) = parse_network_mode_env(v) {
            cfg.network_mode = m;
        }
    });
}

impl ConfigStore {
    pub fn new(paths: &SwapbatchPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<SwapbatchConfig> {
        if !self.path.exists() {
            // Persist before env overrides so API keys from the environment never hit disk.
            let mut cfg = SwapbatchConfig::default();
            self.save(&cfg)?;
            apply_env_overrides(&mut cfg);
            return Ok(cfg);
        }

        let s = fs::read_to_string(&self.path).context("read config.toml")?;
        let mut cfg: SwapbatchConfig = toml::from_str(&s).context("parse config.toml")?;
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &SwapbatchConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_private_atomic(&self.path, &s).context("write config.toml")?;
        Ok(())
    }
}
