use super::DispatchCtx;
use crate::{
    errors::BatchError,
    types::{BatchCall, ExecutionMethod, ExecutionResult},
    wallet::eip5792,
};

/// Hand the whole list to the wallet via `wallet_sendCalls`. The result carries the wallet's
/// batch id; the wallet may still be processing it.
pub(super) async fn execute(
    ctx: &DispatchCtx<'_>,
    calls: &[BatchCall],
    version: &str,
) -> Result<ExecutionResult, BatchError> {
    let params = eip5792::send_calls_params(version, ctx.chain_id, ctx.account, calls);
    let resp = ctx
        .wallet
        .request(eip5792::SEND_CALLS, params)
        .await
        .map_err(|e| BatchError::classify(ctx.label, &e))?;
    let batch_id = eip5792::batch_id(&resp).ok_or_else(|| BatchError::Execution {
        chain: ctx.label.to_owned(),
        message: format!("wallet_sendCalls returned no batch id: {resp}"),
    })?;
    tracing::info!(chain_id = ctx.chain_id, version, batch_id = %batch_id, "wallet accepted call batch");

    Ok(ExecutionResult {
        success: true,
        method: ExecutionMethod::NativeMultiCall,
        chain_id: ctx.chain_id,
        tx_hash: None,
        tx_hashes: vec![],
        batch_id: Some(batch_id),
        fee_summary: None,
        error: None,
    })
}
