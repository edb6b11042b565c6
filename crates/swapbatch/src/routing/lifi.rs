use crate::{
    chains::evm::{parse_u256, EvmChain},
    config::HttpConfig,
    routing::{RouteRequest, RoutingService},
    types::{Route, RouteStep, StepTransaction, TxPayload},
};
use alloy::primitives::Bytes;
use async_trait::async_trait;
use eyre::Context as _;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{str::FromStr as _, time::Duration};

const API_KEY_HEADER: &str = "x-lifi-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutesOptions<'a> {
    integrator: &'a str,
    slippage: f64,
    order: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutesRequest<'a> {
    from_chain_id: u64,
    from_amount: String,
    from_token_address: String,
    to_chain_id: u64,
    to_token_address: String,
    from_address: String,
    to_address: String,
    options: RoutesOptions<'a>,
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<WireRoute>,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRoute {
    id: String,
    from_chain_id: u64,
    from_amount: String,
    from_token: WireToken,
    to_chain_id: u64,
    to_amount: String,
    #[serde(default)]
    to_amount_min: Option<String>,
    to_token: WireToken,
    #[serde(default)]
    from_address: Option<String>,
    #[serde(default)]
    to_address: Option<String>,
    #[serde(default)]
    steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireTx {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAction {
    #[serde(default)]
    from_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStep {
    #[serde(default)]
    id: String,
    #[serde(default)]
    tool: String,
    #[serde(default)]
    action: Option<WireAction>,
    #[serde(default)]
    transaction_request: Option<WireTx>,
}

fn parse_tx(tx: &WireTx) -> eyre::Result<TxPayload> {
    Ok(TxPayload {
        to: EvmChain::parse_address(&tx.to)?,
        data: Bytes::from_str(tx.data.trim()).context("parse step calldata")?,
        value: match tx.value.as_deref() {
            Some(v) => parse_u256(v)?,
            None => alloy::primitives::U256::ZERO,
        },
    })
}

fn parse_step(raw: Value) -> eyre::Result<RouteStep> {
    let wire: WireStep = serde_json::from_value(raw.clone()).context("parse route step")?;
    let transaction = wire.transaction_request.as_ref().map(parse_tx).transpose()?;
    Ok(RouteStep {
        id: wire.id,
        tool: wire.tool,
        transaction,
        raw,
    })
}

fn parse_route(w: WireRoute) -> eyre::Result<Route> {
    let to_amount = parse_u256(&w.to_amount)?;
    let from_address = w
        .from_address
        .as_deref()
        .map(EvmChain::parse_address)
        .transpose()?
        .unwrap_or_default();
    let to_address = w
        .to_address
        .as_deref()
        .map(EvmChain::parse_address)
        .transpose()?
        .unwrap_or(from_address);
    Ok(Route {
        id: w.id,
        from_chain_id: w.from_chain_id,
        from_token: EvmChain::parse_address(&w.from_token.address)?,
        from_amount: parse_u256(&w.from_amount)?,
        to_chain_id: w.to_chain_id,
        to_token: EvmChain::parse_address(&w.to_token.address)?,
        to_amount,
        to_amount_min: w
            .to_amount_min
            .as_deref()
            .map(parse_u256)
            .transpose()?
            .unwrap_or(to_amount),
        from_address,
        to_address,
        steps: w
            .steps
            .into_iter()
            .map(parse_step)
            .collect::<eyre::Result<Vec<_>>>()?,
    })
}

/// Keep every candidate that parses; one malformed route must not hide the rest.
fn parse_routes(wire: Vec<WireRoute>) -> Vec<Route> {
    wire.into_iter()
        .filter_map(|w| {
            let id = w.id.clone();
            match parse_route(w) {
                Ok(route) => Some(route),
                Err(e) => {
                    tracing::warn!(route = %id, error = %e, "skipping unparsable route");
                    None
                }
            }
        })
        .collect()
}

/// Parse a `/advanced/stepTransaction` response.
fn parse_step_transaction(v: Value) -> eyre::Result<Option<StepTransaction>> {
    let wire: WireStep = serde_json::from_value(v).context("parse step transaction")?;
    let Some(tx) = wire.transaction_request.as_ref() else {
        return Ok(None);
    };
    let from_amount = wire
        .action
        .and_then(|a| a.from_amount)
        .as_deref()
        .map(parse_u256)
        .transpose()?;
    Ok(Some(StepTransaction {
        payload: parse_tx(tx)?,
        from_amount,
    }))
}

fn base_url_is_allowed(base_url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }

    let s = base_url.trim();
    if s.starts_with("https://") {
        return true;
    }
    if !s.starts_with("http://") {
        return false;
    }
    host_prefix_ok(s, "http://127.0.0.1")
        || host_prefix_ok(s, "http://localhost")
        || host_prefix_ok(s, "http://[::1]")
}

/// LI.FI-compatible routing API client.
#[derive(Debug, Clone)]
pub struct LifiRouter {
    client: Client,
    base_url: String,
    integrator: String,
    slippage_bps: u32,
}

impl LifiRouter {
    pub fn new(http: &HttpConfig) -> eyre::Result<Self> {
        if !base_url_is_allowed(&http.routing_base_url) {
            eyre::bail!("routing_base_url must use https (or http://localhost for local testing)");
        }
        let mut headers = HeaderMap::new();
        if let Some(key) = http.routing_api_key.as_deref() {
            headers.insert(
                API_KEY_HEADER,
                HeaderValue::from_str(key.trim()).context("invalid routing api key")?,
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: http.routing_base_url.trim_end_matches('/').to_owned(),
            integrator: http.routing_integrator.clone(),
            slippage_bps: http.slippage_bps,
        })
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> eyre::Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let v = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("routing request {path}"))?
            .error_for_status()
            .with_context(|| format!("routing status {path}"))?
            .json()
            .await
            .with_context(|| format!("routing json {path}"))?;
        Ok(v)
    }
}

#[async_trait]
impl RoutingService for LifiRouter {
    async fn routes(&self, req: &RouteRequest) -> eyre::Result<Vec<Route>> {
        let body = RoutesRequest {
            from_chain_id: req.from_chain_id,
            from_amount: req.from_amount.to_string(),
            from_token_address: format!("{:#x}", req.from_token),
            to_chain_id: req.to_chain_id,
            to_token_address: format!("{:#x}", req.to_token),
            from_address: format!("{:#x}", req.from_address),
            to_address: format!("{:#x}", req.to_address),
            options: RoutesOptions {
                integrator: &self.integrator,
                slippage: f64::from(self.slippage_bps) / 10_000.0,
                order: "RECOMMENDED",
            },
        };
        let v = self.post_json("/advanced/routes", &body).await?;
        let resp: RoutesResponse = serde_json::from_value(v).context("parse routes response")?;
        tracing::debug!(count = resp.routes.len(), "routing service returned routes");
        Ok(parse_routes(resp.routes))
    }

    async fn step_transaction(&self, route: &Route) -> eyre::Result<Option<StepTransaction>> {
        let Some(step) = route.first_step() else {
            return Ok(None);
        };
        let v = self
            .post_json("/advanced/stepTransaction", &step.raw)
            .await?;
        parse_step_transaction(v)
    }
}
