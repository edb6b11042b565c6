use super::DispatchCtx;
use crate::{
    errors::BatchError,
    status::BatchStatus,
    types::{BatchCall, ExecutionMethod, ExecutionResult, FeeSummary},
    wallet::AuthorizationRequest,
};
use alloy::{
    network::TransactionBuilder as _,
    primitives::{Address, Bytes, U256},
    rpc::types::TransactionRequest,
    sol,
    sol_types::SolCall as _,
};

sol! {
    struct Call {
        address target;
        uint256 value;
        bytes data;
    }

    function executeBatch(Call[] calls) external payable;
}

pub fn encode_execute_batch(calls: &[BatchCall]) -> Bytes {
    let calls = calls
        .iter()
        .map(|c| Call {
            target: c.to,
            value: c.value_or_zero(),
            data: c.data.clone(),
        })
        .collect();
    Bytes::from(executeBatchCall { calls }.abi_encode())
}

pub fn total_value(calls: &[BatchCall]) -> U256 {
    calls
        .iter()
        .fold(U256::ZERO, |acc, c| acc.saturating_add(c.value_or_zero()))
}

/// Delegate the account to `executor` and run every call in one type-4 transaction sent to
/// the account itself.
pub(super) async fn execute(
    ctx: &DispatchCtx<'_>,
    calls: &[BatchCall],
    executor: Address,
) -> Result<ExecutionResult, BatchError> {
    let chain = ctx.chain()?;
    let nonce = chain
        .get_transaction_count(ctx.account)
        .await
        .map_err(|e| BatchError::classify_report(ctx.label, &e))?;

    // The outer transaction consumes `nonce`; the authorization is checked after the bump.
    let auth = ctx
        .wallet
        .sign_authorization(AuthorizationRequest {
            chain_id: ctx.chain_id,
            contract: executor,
            nonce: nonce.saturating_add(1),
        })
        .await
        .map_err(|e| BatchError::classify(ctx.label, &e))?;

    let mut tx = TransactionRequest::default()
        .with_from(ctx.account)
        .with_to(ctx.account)
        .with_input(encode_execute_batch(calls))
        .with_value(total_value(calls));
    tx.nonce = Some(nonce);
    tx.authorization_list = Some(vec![auth]);

    let hash = ctx
        .wallet
        .send_transaction(tx)
        .await
        .map_err(|e| BatchError::classify(ctx.label, &e))?;
    ctx.opts.report(BatchStatus::WaitingForConfirmation {
        chain: ctx.label.to_owned(),
    });

    let receipt = chain
        .wait_for_receipt(hash)
        .await
        .map_err(|e| BatchError::classify_report(ctx.label, &e))?;
    if !receipt.success {
        return Err(BatchError::Execution {
            chain: ctx.label.to_owned(),
            message: format!("batch transaction {hash} reverted"),
        });
    }
    ctx.opts.progress(calls.len(), calls.len());

    Ok(ExecutionResult {
        success: true,
        method: ExecutionMethod::DelegatedBundle,
        chain_id: ctx.chain_id,
        tx_hash: Some(hash),
        tx_hashes: vec![hash],
        batch_id: None,
        fee_summary: Some(FeeSummary {
            total_fee_wei: receipt.fee_wei(),
            gas_used: receipt.gas_used,
            transactions: 1,
        }),
        error: None,
    })
}
