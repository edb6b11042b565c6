//! Ordered probe strategies for delegated bundling and wallet-native multi-call.

use crate::wallet::{eip5792, WalletClient, WalletMethod};
use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Supported { version: Option<String> },
    /// Definitely unsupported; later strategies are not consulted.
    Unsupported,
    /// This strategy couldn't tell; try the next one.
    Inconclusive,
}

/// Shared inputs for one detection pass. `wallet_getCapabilities` is fetched at most once.
pub struct ProbeContext<'a> {
    pub wallet: &'a dyn WalletClient,
    pub account: Address,
    pub chain_id: u64,
    pub versions: &'a [String],
    declared: OnceCell<Option<Value>>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(
        wallet: &'a dyn WalletClient,
        account: Address,
        chain_id: u64,
        versions: &'a [String],
    ) -> Self {
        Self {
            wallet,
            account,
            chain_id,
            versions,
            declared: OnceCell::new(),
        }
    }

    pub async fn declared_capabilities(&self) -> Option<&Value> {
        self.declared
            .get_or_init(|| async {
                let params = eip5792::get_capabilities_params(self.account, self.chain_id);
                match self.wallet.request(eip5792::GET_CAPABILITIES, params).await {
                    Ok(v) => Some(v),
                    Err(e) => {
                        debug!(chain_id = self.chain_id, error = %e, "wallet_getCapabilities failed");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome;
}

/// Run `strategies` in order; the first conclusive answer wins, exhaustion means unsupported.
pub async fn run_probes(strategies: &[Box<dyn ProbeStrategy>], ctx: &ProbeContext<'_>) -> ProbeOutcome {
    for s in strategies {
        let outcome = s.attempt(ctx).await;
        debug!(probe = s.name(), chain_id = ctx.chain_id, ?outcome, "probe attempted");
        if outcome != ProbeOutcome::Inconclusive {
            return outcome;
        }
    }
    ProbeOutcome::Unsupported
}

pub fn delegated_bundling_probes() -> Vec<Box<dyn ProbeStrategy>> {
    vec![
        Box::new(DirectSignAuthorization),
        Box::new(ExperimentalSignAuthorization),
        Box::new(DeclaredDelegationCapability),
        Box::new(MalformedAuthorizationProbe),
    ]
}

pub fn native_multi_call_probes() -> Vec<Box<dyn ProbeStrategy>> {
    vec![Box::new(DeclaredAtomicCapability), Box::new(SendCallsVersionProbe)]
}

#[derive(Debug, Clone, Copy)]
pub struct DirectSignAuthorization;

#[async_trait]
impl ProbeStrategy for DirectSignAuthorization {
    fn name(&self) -> &'static str {
        "direct_sign_authorization"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        if ctx.wallet.exposes(WalletMethod::SignAuthorization) {
            ProbeOutcome::Supported { version: None }
        } else {
            ProbeOutcome::Inconclusive
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExperimentalSignAuthorization;

#[async_trait]
impl ProbeStrategy for ExperimentalSignAuthorization {
    fn name(&self) -> &'static str {
        "experimental_sign_authorization"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        if ctx.wallet.exposes(WalletMethod::ExperimentalSignAuthorization) {
            ProbeOutcome::Supported { version: None }
        } else {
            ProbeOutcome::Inconclusive
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeclaredDelegationCapability;

#[async_trait]
impl ProbeStrategy for DeclaredDelegationCapability {
    fn name(&self) -> &'static str {
        "declared_delegation_capability"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        let declared = ctx
            .declared_capabilities()
            .await
            .and_then(|v| eip5792::chain_capabilities(v, ctx.chain_id))
            .is_some_and(eip5792::declares_delegation);
        if declared {
            ProbeOutcome::Supported { version: None }
        } else {
            ProbeOutcome::Inconclusive
        }
    }
}

/// Sends deliberately malformed params: "method not found" means absent, any other answer
/// means the wallet knows the method.
#[derive(Debug, Clone, Copy)]
pub struct MalformedAuthorizationProbe;

#[async_trait]
impl ProbeStrategy for MalformedAuthorizationProbe {
    fn name(&self) -> &'static str {
        "malformed_authorization_probe"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        match ctx
            .wallet
            .request(eip5792::SIGN_AUTHORIZATION, json!([{ "probe": true }]))
            .await
        {
            Err(e) if e.is_method_not_found() => ProbeOutcome::Unsupported,
            Ok(_) | Err(_) => ProbeOutcome::Supported { version: None },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeclaredAtomicCapability;

#[async_trait]
impl ProbeStrategy for DeclaredAtomicCapability {
    fn name(&self) -> &'static str {
        "declared_atomic_capability"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        let Some(caps) = ctx
            .declared_capabilities()
            .await
            .and_then(|v| eip5792::chain_capabilities(v, ctx.chain_id))
        else {
            return ProbeOutcome::Inconclusive;
        };
        match eip5792::declared_atomic(caps) {
            eip5792::DeclaredAtomic::Ready { version } => ProbeOutcome::Supported {
                version: Some(version),
            },
            eip5792::DeclaredAtomic::NotReady => ProbeOutcome::Unsupported,
            eip5792::DeclaredAtomic::Absent => ProbeOutcome::Inconclusive,
        }
    }
}

/// Negotiate a `wallet_sendCalls` version with an empty call list, newest first.
#[derive(Debug, Clone, Copy)]
pub struct SendCallsVersionProbe;

#[async_trait]
impl ProbeStrategy for SendCallsVersionProbe {
    fn name(&self) -> &'static str {
        "send_calls_version_probe"
    }

    async fn attempt(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome {
        for version in ctx.versions {
            let params = eip5792::send_calls_params(version, ctx.chain_id, ctx.account, &[]);
            match ctx.wallet.request(eip5792::SEND_CALLS, params).await {
                Err(e) if e.is_method_not_found() => return ProbeOutcome::Unsupported,
                Err(e) if eip5792::is_unsupported_version(&e) => {
                    debug!(version = %version, "wallet_sendCalls version rejected");
                }
                Ok(_) | Err(_) => {
                    return ProbeOutcome::Supported {
                        version: Some(version.clone()),
                    }
                }
            }
        }
        ProbeOutcome::Unsupported
    }
}
