//! Executes one chain's calls with the best method the wallet supports.

mod delegated;
mod native;
mod sequential;

pub use delegated::{encode_execute_batch, total_value};

use crate::{
    capability::CapabilityDetector,
    chains::{registry::ChainRegistry, ChainClient},
    config::SwapbatchConfig,
    errors::BatchError,
    status::{BatchStatus, StatusReporter},
    types::{BatchCall, ExecutionMethod, ExecutionResult},
    wallet::WalletClient,
};
use alloy::primitives::Address;
use eyre::Context as _;
use std::{str::FromStr as _, sync::Arc};

/// `on_progress(done, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub force_method: Option<ExecutionMethod>,
    pub on_progress: Option<ProgressFn>,
    pub status: Option<Arc<StatusReporter>>,
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("force_method", &self.force_method)
            .field("on_progress", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecuteOptions {
    fn report(&self, status: BatchStatus) {
        if let Some(s) = &self.status {
            s.set(status);
        }
    }

    fn progress(&self, done: usize, total: usize) {
        if let Some(f) = &self.on_progress {
            f(done, total);
        }
    }
}

/// Number of dispatches needed for `count` calls at `max` per batch.
pub fn batches_needed(count: usize, max: usize) -> usize {
    count.div_ceil(max.max(1))
}

pub fn split_calls(calls: &[BatchCall], max: usize) -> Vec<Vec<BatchCall>> {
    calls.chunks(max.max(1)).map(<[BatchCall]>::to_vec).collect()
}

/// Everything one strategy needs for a single dispatch.
struct DispatchCtx<'a> {
    wallet: &'a dyn WalletClient,
    chain: Option<Arc<dyn ChainClient>>,
    account: Address,
    chain_id: u64,
    label: &'a str,
    opts: &'a ExecuteOptions,
}

impl DispatchCtx<'_> {
    fn chain(&self) -> Result<&dyn ChainClient, BatchError> {
        self.chain.as_deref().ok_or_else(|| BatchError::Execution {
            chain: self.label.to_owned(),
            message: "no RPC client configured for this chain".into(),
        })
    }
}

pub struct Dispatcher {
    detector: Arc<CapabilityDetector>,
    registry: ChainRegistry,
    batch_executor: Address,
    default_version: String,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("batch_executor", &self.batch_executor)
            .field("default_version", &self.default_version)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        detector: Arc<CapabilityDetector>,
        registry: ChainRegistry,
        batch_executor: Address,
        default_version: String,
    ) -> Self {
        Self {
            detector,
            registry,
            batch_executor,
            default_version,
        }
    }

    pub fn from_config(
        detector: Arc<CapabilityDetector>,
        cfg: &SwapbatchConfig,
    ) -> eyre::Result<Self> {
        let batch_executor = Address::from_str(cfg.execution.batch_executor.trim())
            .context("parse execution.batch_executor")?;
        let default_version = cfg
            .execution
            .multicall_versions
            .first()
            .cloned()
            .unwrap_or_else(|| "2.0.0".into());
        Ok(Self::new(
            detector,
            ChainRegistry::from_rpc_config(&cfg.rpc),
            batch_executor,
            default_version,
        ))
    }

    pub fn detector(&self) -> &Arc<CapabilityDetector> {
        &self.detector
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Execute `calls` on `chain_id` as one unit of work.
    pub async fn execute_batch(
        &self,
        calls: &[BatchCall],
        chain_id: u64,
        opts: &ExecuteOptions,
    ) -> Result<ExecutionResult, BatchError> {
        if calls.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        let wallet = self.detector.wallet();
        let account = wallet.account().ok_or(BatchError::NoAccount)?;
        let label = self
            .registry
            .display_name(chain_id)
            .ok_or(BatchError::UnknownChain(chain_id))?
            .to_owned();

        let snapshot = self.detector.snapshot_for(chain_id).await;
        let method = match opts.force_method.unwrap_or(snapshot.preferred_method) {
            ExecutionMethod::None => ExecutionMethod::Sequential,
            m => m,
        };
        tracing::info!(chain_id, calls = calls.len(), method = %method, "dispatching batch");
        opts.report(BatchStatus::Signing {
            chain: label.clone(),
            method,
        });

        let ctx = DispatchCtx {
            wallet: wallet.as_ref(),
            chain: self.detector.chains().get(chain_id),
            account,
            chain_id,
            label: &label,
            opts,
        };
        let res = match method {
            ExecutionMethod::DelegatedBundle => {
                delegated::execute(&ctx, calls, self.batch_executor).await
            }
            ExecutionMethod::NativeMultiCall => {
                let version = snapshot
                    .protocol_version
                    .as_deref()
                    .unwrap_or(&self.default_version);
                native::execute(&ctx, calls, version).await
            }
            ExecutionMethod::Sequential | ExecutionMethod::None => {
                sequential::execute(&ctx, calls).await
            }
        };
        if let Err(e) = &res {
            tracing::warn!(chain_id, method = %method, error = %e, "batch dispatch failed");
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    fn calls(n: usize) -> Vec<BatchCall> {
        (0..n)
            .map(|i| BatchCall {
                to: Address::with_last_byte(u8::try_from(i % 255).unwrap_or(0)),
                data: Bytes::new(),
                value: None,
            })
            .collect()
    }

    #[test]
    fn batches_needed_is_ceiling_division() {
        assert_eq!(batches_needed(23, 10), 3);
        assert_eq!(batches_needed(10, 10), 1);
        assert_eq!(batches_needed(11, 10), 2);
        assert_eq!(batches_needed(0, 10), 0);
        assert_eq!(batches_needed(3, 0), 3, "zero limit treated as one per batch");
    }

    #[test]
    fn split_keeps_order_and_sizes() {
        let all = calls(23);
        let parts = split_calls(&all, 10);
        assert_eq!(parts.len(), batches_needed(23, 10));
        assert_eq!(
            parts.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![10, 10, 3]
        );
        assert_eq!(parts.concat(), all, "concatenation restores the input");
    }
}
