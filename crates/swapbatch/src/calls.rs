use crate::{
    chains::{evm::erc20_approve_calldata, ChainClient},
    routing::RoutingService,
    types::{is_native_token, BatchCall, Route},
};
use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Collaborators the call builder reads from.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub sender: Address,
    pub routing: &'a dyn RoutingService,
    pub chain: &'a dyn ChainClient,
}

/// An allowance read that may have failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceRead {
    Known(U256),
    Degraded(String),
}

pub async fn read_allowance(
    chain: &dyn ChainClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> AllowanceRead {
    match chain.erc20_allowance(token, owner, spender).await {
        Ok(v) => AllowanceRead::Known(v),
        Err(e) => AllowanceRead::Degraded(format!("{e:#}")),
    }
}

pub fn approve_call(token: Address, spender: Address, amount: U256) -> BatchCall {
    BatchCall {
        to: token,
        data: Bytes::from(erc20_approve_calldata(spender, amount)),
        value: None,
    }
}

/// Turn routes into calls for `chain_id`, keeping route order.
///
/// Each route contributes an optional exact-amount `approve` followed by its swap call.
/// Routes for other chains, without steps, or without a fresh step transaction are skipped.
pub async fn build_calls_from_routes(
    routes: &[Arc<Route>],
    chain_id: u64,
    ctx: &BuildContext<'_>,
) -> Vec<BatchCall> {
    let mut calls = Vec::with_capacity(routes.len() * 2);
    for route in routes {
        if route.from_chain_id != chain_id {
            warn!(
                route = %route.id,
                route_chain = route.from_chain_id,
                chain_id,
                "route is for another chain, skipping"
            );
            continue;
        }
        if route.first_step().is_none() {
            warn!(route = %route.id, "route has no steps, skipping");
            continue;
        }
        let step_tx = match ctx.routing.step_transaction(route).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                warn!(route = %route.id, "no transaction for first step, skipping");
                continue;
            }
            Err(e) => {
                warn!(route = %route.id, error = %format!("{e:#}"), "step transaction refresh failed, skipping");
                continue;
            }
        };

        let amount = step_tx.from_amount.unwrap_or(route.from_amount);
        if !is_native_token(route.from_token) && !amount.is_zero() {
            let spender = step_tx.payload.to;
            match read_allowance(ctx.chain, route.from_token, ctx.sender, spender).await {
                AllowanceRead::Known(current) if current < amount => {
                    debug!(route = %route.id, token = %route.from_token, %current, %amount, "approval needed");
                    calls.push(approve_call(route.from_token, spender, amount));
                }
                AllowanceRead::Known(_) => {}
                AllowanceRead::Degraded(reason) => {
                    warn!(route = %route.id, token = %route.from_token, reason = %reason, "allowance read failed, continuing without approval");
                }
            }
        }

        calls.push(BatchCall {
            to: step_tx.payload.to,
            data: step_tx.payload.data,
            value: Some(step_tx.payload.value),
        });
    }
    calls
}
