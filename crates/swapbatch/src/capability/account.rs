use crate::{chains::ChainClient, types::AccountKind};
use alloy::primitives::Address;

/// EIP-7702 delegation designator: `0xef0100 ‖ address`.
pub const DELEGATION_DESIGNATOR: [u8; 3] = [0xef, 0x01, 0x00];

pub fn classify_bytecode(code: &[u8]) -> AccountKind {
    if code.is_empty() || code.starts_with(&DELEGATION_DESIGNATOR) {
        AccountKind::Eoa
    } else {
        AccountKind::ContractAccount
    }
}

/// Read the account's code. RPC failures and missing clients give `Unknown`.
pub async fn detect_account_kind(chain: Option<&dyn ChainClient>, account: Address) -> AccountKind {
    let Some(chain) = chain else {
        return AccountKind::Unknown;
    };
    match chain.get_code(account).await {
        Ok(code) => classify_bytecode(&code),
        Err(e) => {
            tracing::warn!(chain_id = chain.chain_id(), %account, error = %format!("{e:#}"), "bytecode read failed");
            AccountKind::Unknown
        }
    }
}
