mod common;

use alloy::primitives::{Address, U256};
use common::{account, new_log, request, swap_data, token, FakeChain, FakeRouting, BASE, OPTIMISM, ROUTER};
use std::sync::Arc;
use swapbatch::{
    calls::{approve_call, build_calls_from_routes, BuildContext},
    types::{BatchCall, Route},
};

fn route(chain: u64, from: Address, amount: u64) -> Arc<Route> {
    Arc::new(FakeRouting::route_for(
        &request(chain, from, amount, OPTIMISM).to_route_request(),
    ))
}

fn swap(from: Address) -> BatchCall {
    BatchCall {
        to: ROUTER,
        data: swap_data(from),
        value: Some(U256::ZERO),
    }
}

#[tokio::test]
async fn approvals_precede_their_swap_and_only_when_needed() {
    let log = new_log();
    let mut chain = FakeChain::new(BASE, &log);
    chain.allowances.insert(token(0x22), U256::from(5_u64));
    let routing = FakeRouting::default();
    let ctx = BuildContext {
        sender: account(),
        routing: &routing,
        chain: &chain,
    };

    let calls = build_calls_from_routes(
        &[route(BASE, token(0x11), 100), route(BASE, token(0x22), 200)],
        BASE,
        &ctx,
    )
    .await;

    assert_eq!(
        calls,
        vec![
            swap(token(0x11)),
            approve_call(token(0x22), ROUTER, U256::from(200_u64)),
            swap(token(0x22)),
        ]
    );
}

#[tokio::test]
async fn refreshed_step_amount_sets_the_approval() {
    let log = new_log();
    let mut chain = FakeChain::new(BASE, &log);
    chain.allowances.insert(token(0x22), U256::ZERO);
    let mut routing = FakeRouting::default();
    routing.refreshed_amounts.insert(token(0x22), U256::from(260_u64));
    let ctx = BuildContext {
        sender: account(),
        routing: &routing,
        chain: &chain,
    };

    let calls = build_calls_from_routes(&[route(BASE, token(0x22), 200)], BASE, &ctx).await;

    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls.first(),
        Some(&approve_call(token(0x22), ROUTER, U256::from(260_u64)))
    );
}

#[tokio::test]
async fn native_sources_never_need_approval() {
    let log = new_log();
    let mut chain = FakeChain::new(BASE, &log);
    chain.allowances.insert(Address::ZERO, U256::ZERO);
    let routing = FakeRouting::default();
    let ctx = BuildContext {
        sender: account(),
        routing: &routing,
        chain: &chain,
    };

    let calls = build_calls_from_routes(&[route(BASE, Address::ZERO, 100)], BASE, &ctx).await;

    assert_eq!(calls, vec![swap(Address::ZERO)]);
}

#[tokio::test]
async fn failed_allowance_read_still_emits_the_swap() {
    let log = new_log();
    let mut chain = FakeChain::new(BASE, &log);
    chain.allowance_fails = true;
    let routing = FakeRouting::default();
    let ctx = BuildContext {
        sender: account(),
        routing: &routing,
        chain: &chain,
    };

    let calls = build_calls_from_routes(&[route(BASE, token(0x22), 200)], BASE, &ctx).await;

    assert_eq!(calls, vec![swap(token(0x22))]);
}

#[tokio::test]
async fn routes_for_other_chains_or_without_steps_are_skipped() {
    let log = new_log();
    let chain = FakeChain::new(BASE, &log);
    let routing = FakeRouting::default();
    let ctx = BuildContext {
        sender: account(),
        routing: &routing,
        chain: &chain,
    };
    let mut stepless = FakeRouting::route_for(&request(BASE, token(0x33), 1, OPTIMISM).to_route_request());
    stepless.steps.clear();

    let calls = build_calls_from_routes(
        &[
            route(OPTIMISM, token(0x11), 100),
            Arc::new(stepless),
            route(BASE, token(0x44), 100),
        ],
        BASE,
        &ctx,
    )
    .await;

    assert_eq!(calls, vec![swap(token(0x44))]);
}
