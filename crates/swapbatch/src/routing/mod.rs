pub mod lifi;

use crate::types::{Route, StepTransaction};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

/// A swap to quote: source token and amount, destination token, sender and recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub from_chain_id: u64,
    pub from_token: Address,
    pub from_amount: U256,
    pub to_chain_id: u64,
    pub to_token: Address,
    pub from_address: Address,
    pub to_address: Address,
}

#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Candidate routes, best first. An empty list means "no route".
    async fn routes(&self, req: &RouteRequest) -> eyre::Result<Vec<Route>>;

    /// A fresh transaction for the route's first step. `None` when the service has none.
    async fn step_transaction(&self, route: &Route) -> eyre::Result<Option<StepTransaction>>;
}
