use super::DispatchCtx;
use crate::{
    errors::BatchError,
    status::BatchStatus,
    types::{BatchCall, ExecutionMethod, ExecutionResult, FeeSummary},
};
use alloy::{
    network::TransactionBuilder as _,
    primitives::{B256, U256},
    rpc::types::TransactionRequest,
};

/// One transaction per call. Each receipt is awaited before the next submission.
pub(super) async fn execute(
    ctx: &DispatchCtx<'_>,
    calls: &[BatchCall],
) -> Result<ExecutionResult, BatchError> {
    let chain = ctx.chain()?;
    let total = calls.len();
    let mut hashes = Vec::with_capacity(total);
    let mut fee = U256::ZERO;
    let mut gas_used = 0_u64;

    for (i, call) in calls.iter().enumerate() {
        let tx = TransactionRequest::default()
            .with_from(ctx.account)
            .with_to(call.to)
            .with_input(call.data.clone())
            .with_value(call.value_or_zero());
        let outcome = match ctx.wallet.send_transaction(tx).await {
            Ok(hash) => {
                ctx.opts.report(BatchStatus::WaitingForConfirmation {
                    chain: ctx.label.to_owned(),
                });
                match chain.wait_for_receipt(hash).await {
                    Ok(receipt) if receipt.success => Ok((hash, receipt)),
                    Ok(_) => Err(BatchError::Execution {
                        chain: ctx.label.to_owned(),
                        message: format!("transaction {hash} ({} of {total}) reverted", i + 1),
                    }),
                    Err(e) => Err(BatchError::classify_report(ctx.label, &e)),
                }
            }
            Err(e) => Err(BatchError::classify(ctx.label, &e)),
        };
        let (hash, receipt) = match outcome {
            Ok(confirmed) => confirmed,
            Err(cause) if hashes.is_empty() => return Err(cause),
            Err(cause) => {
                tracing::warn!(
                    chain_id = ctx.chain_id,
                    confirmed = hashes.len(),
                    total,
                    error = %cause,
                    "sequential batch stopped after partial execution"
                );
                let confirmed =
                    summarize(ctx.chain_id, hashes, fee, gas_used, Some(cause.to_string()));
                return Err(BatchError::PartiallyExecuted {
                    cause: Box::new(cause),
                    confirmed: Box::new(confirmed),
                });
            }
        };
        fee = fee.saturating_add(receipt.fee_wei());
        gas_used = gas_used.saturating_add(receipt.gas_used);
        hashes.push(hash);
        tracing::debug!(chain_id = ctx.chain_id, done = i + 1, total, tx = %hash, "sequential call confirmed");
        ctx.opts.progress(i + 1, total);
    }

    Ok(summarize(ctx.chain_id, hashes, fee, gas_used, None))
}

fn summarize(
    chain_id: u64,
    hashes: Vec<B256>,
    fee: U256,
    gas_used: u64,
    error: Option<String>,
) -> ExecutionResult {
    ExecutionResult {
        success: error.is_none(),
        method: ExecutionMethod::Sequential,
        chain_id,
        tx_hash: hashes.last().copied(),
        fee_summary: Some(FeeSummary {
            total_fee_wei: fee,
            gas_used,
            transactions: hashes.len(),
        }),
        tx_hashes: hashes,
        batch_id: None,
        error,
    }
}
