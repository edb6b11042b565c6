pub mod cache;
pub mod session;

pub use cache::{QuoteCache, QuoteCacheEntry};
pub use session::{QuoteSession, QuoteState, RoundOutcome, RoundToken};

use crate::{
    routing::{RouteRequest, RoutingService},
    types::Route,
};
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The token a user picked to sell, with its default amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSelection {
    pub chain_id: u64,
    pub address: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub from_token: TokenSelection,
    pub to_chain_id: u64,
    pub to_token: Address,
    pub from_address: Address,
    pub to_address: Address,
    /// Overrides `from_token.amount` when set.
    pub custom_amount: Option<U256>,
}

impl QuoteRequest {
    pub fn amount(&self) -> U256 {
        self.custom_amount.unwrap_or(self.from_token.amount)
    }

    /// Selling a token for itself on the same chain.
    pub fn is_noop(&self) -> bool {
        self.from_token.chain_id == self.to_chain_id && self.from_token.address == self.to_token
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}:{:#x}:{}:{}:{:#x}:{:#x}:{:#x}",
            self.from_token.chain_id,
            self.from_token.address,
            self.amount(),
            self.to_chain_id,
            self.to_token,
            self.from_address,
            self.to_address,
        )
    }

    /// Key identifying the source token in a quote session.
    pub fn token_key(&self) -> String {
        format!("{}:{:#x}", self.from_token.chain_id, self.from_token.address)
    }

    pub fn to_route_request(&self) -> RouteRequest {
        RouteRequest {
            from_chain_id: self.from_token.chain_id,
            from_token: self.from_token.address,
            from_amount: self.amount(),
            to_chain_id: self.to_chain_id,
            to_token: self.to_token,
            from_address: self.from_address,
            to_address: self.to_address,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub route: Arc<Route>,
    pub cache_key: String,
    pub cached: bool,
}

/// Result of asking the routing service for a route.
#[derive(Debug, Clone)]
pub enum RouteLookup {
    Found(Route),
    NoRoute,
    Degraded(String),
}

/// Cache-fronted route lookup.
pub struct RouteResolver {
    routing: Arc<dyn RoutingService>,
    cache: Arc<QuoteCache>,
}

impl std::fmt::Debug for RouteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RouteResolver {
    pub fn new(routing: Arc<dyn RoutingService>, cache: Arc<QuoteCache>) -> Self {
        Self { routing, cache }
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn routing(&self) -> &Arc<dyn RoutingService> {
        &self.routing
    }

    /// One route for `req`, or `None` for no-op requests, missing routes and service failures.
    pub async fn get_route_quote(&self, req: &QuoteRequest) -> Option<QuoteOutcome> {
        if req.is_noop() {
            debug!(token = %req.token_key(), "same token and chain, nothing to quote");
            return None;
        }
        let key = req.cache_key();
        if let Some(route) = self.cache.get(&key) {
            debug!(key = %key, "quote cache hit");
            return Some(QuoteOutcome {
                route,
                cache_key: key,
                cached: true,
            });
        }
        match self.fetch_route(req).await {
            RouteLookup::Found(route) => {
                let route = Arc::new(route);
                self.cache.set(key.clone(), Arc::clone(&route));
                Some(QuoteOutcome {
                    route,
                    cache_key: key,
                    cached: false,
                })
            }
            RouteLookup::NoRoute => {
                info!(key = %key, "no route available");
                None
            }
            RouteLookup::Degraded(reason) => {
                warn!(key = %key, reason = %reason, "route fetch failed");
                None
            }
        }
    }

    /// Ask the routing service once, bypassing the cache.
    pub async fn fetch_route(&self, req: &QuoteRequest) -> RouteLookup {
        match self.routing.routes(&req.to_route_request()).await {
            Ok(routes) => routes
                .into_iter()
                .next()
                .map_or(RouteLookup::NoRoute, RouteLookup::Found),
            Err(e) => RouteLookup::Degraded(format!("{e:#}")),
        }
    }

    /// Quote every request concurrently; results line up with `reqs`.
    pub async fn quote_all(&self, reqs: &[QuoteRequest]) -> Vec<Option<QuoteOutcome>> {
        join_all(reqs.iter().map(|r| self.get_route_quote(r))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> QuoteRequest {
        QuoteRequest {
            from_token: TokenSelection {
                chain_id: 8453,
                address: Address::repeat_byte(0xAB),
                amount: U256::from(5_u64),
            },
            to_chain_id: 10,
            to_token: Address::repeat_byte(0xCD),
            from_address: Address::repeat_byte(0x01),
            to_address: Address::repeat_byte(0x02),
            custom_amount: None,
        }
    }

    #[test]
    fn cache_key_is_lowercase_and_uses_custom_amount() {
        let mut r = req();
        assert_eq!(
            r.cache_key(),
            format!(
                "8453:0x{}:5:10:0x{}:0x{}:0x{}",
                "ab".repeat(20),
                "cd".repeat(20),
                "01".repeat(20),
                "02".repeat(20)
            )
        );
        r.custom_amount = Some(U256::from(9_u64));
        assert!(r.cache_key().contains(":9:"), "custom amount wins");
    }

    #[test]
    fn same_chain_same_token_is_noop() {
        let mut r = req();
        assert!(!r.is_noop());
        r.to_chain_id = 8453;
        r.to_token = r.from_token.address;
        assert!(r.is_noop(), "identical asset on identical chain");
    }
}
