//! EIP-5792 request shapes and capability parsing.

use crate::{errors::WalletError, types::BatchCall};
use alloy::primitives::Address;
use serde_json::{json, Map, Value};

pub const GET_CAPABILITIES: &str = "wallet_getCapabilities";
pub const SEND_CALLS: &str = "wallet_sendCalls";
pub const SIGN_AUTHORIZATION: &str = "wallet_signAuthorization";

pub fn chain_id_hex(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

pub fn get_capabilities_params(account: Address, chain_id: u64) -> Value {
    json!([account, [chain_id_hex(chain_id)]])
}

/// `wallet_sendCalls` params for the negotiated `version`.
pub fn send_calls_params(
    version: &str,
    chain_id: u64,
    from: Address,
    calls: &[BatchCall],
) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|c| {
            json!({
                "to": c.to,
                "data": c.data,
                "value": format!("{:#x}", c.value_or_zero()),
            })
        })
        .collect();
    let mut body = json!({
        "version": version,
        "chainId": chain_id_hex(chain_id),
        "from": from,
        "calls": calls,
    });
    if !version.starts_with("1.") {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("atomicRequired".into(), Value::Bool(true));
        }
    }
    json!([body])
}

/// 2.x wallets answer `{ "id": … }`, 1.x wallets a bare string.
pub fn batch_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("id").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

/// Normalise a capability map key: `8453`, `0x2105` and `eip155:8453` all map to `8453`.
pub fn normalize_chain_key(key: &str) -> Option<u64> {
    let k = key.trim();
    let id = k.rsplit_once(':').map_or(k, |(_, id)| id).trim();
    if let Some(h) = id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        return u64::from_str_radix(h, 16).ok();
    }
    id.parse::<u64>().ok()
}

/// The capability object for `chain_id` in a `wallet_getCapabilities` response.
pub fn chain_capabilities(resp: &Value, chain_id: u64) -> Option<&Map<String, Value>> {
    resp.as_object()?
        .iter()
        .find(|(k, _)| normalize_chain_key(k) == Some(chain_id))
        .and_then(|(_, v)| v.as_object())
}

/// A capability flag is ready when `status` is `supported`/`ready` or `supported` is `true`.
pub fn flag_is_ready(v: &Value) -> bool {
    let status_ok = v
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| matches!(s, "supported" | "ready"));
    let supported = v.get("supported").and_then(Value::as_bool) == Some(true);
    status_ok || supported
}

/// What a chain's entry declares about atomic multi-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredAtomic {
    /// Neither `atomic` nor `atomicBatch` is present.
    Absent,
    Ready { version: String },
    NotReady,
}

pub fn declared_atomic(caps: &Map<String, Value>) -> DeclaredAtomic {
    if let Some(v) = caps.get("atomic") {
        return if flag_is_ready(v) {
            DeclaredAtomic::Ready {
                version: "2.0.0".into(),
            }
        } else {
            DeclaredAtomic::NotReady
        };
    }
    if let Some(v) = caps.get("atomicBatch") {
        return if flag_is_ready(v) {
            DeclaredAtomic::Ready {
                version: "1.0.0".into(),
            }
        } else {
            DeclaredAtomic::NotReady
        };
    }
    DeclaredAtomic::Absent
}

/// `eip7702` declared ready, or `atomic` in the `ready` state (upgrade on first use).
pub fn declares_delegation(caps: &Map<String, Value>) -> bool {
    let atomic_ready = caps
        .get("atomic")
        .and_then(|v| v.get("status"))
        .and_then(Value::as_str)
        == Some("ready");
    caps.get("eip7702").is_some_and(flag_is_ready) || atomic_ready
}

/// Whether a `wallet_sendCalls` rejection is about the requested version.
pub fn is_unsupported_version(err: &WalletError) -> bool {
    let s = err.message.to_lowercase();
    s.contains("version") && (s.contains("unsupported") || s.contains("not supported"))
}
