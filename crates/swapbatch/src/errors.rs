use crate::types::ExecutionResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC "method not found".
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;
/// EIP-1193 "user rejected request".
pub const RPC_USER_REJECTED: i64 = 4001;

/// An error reported by a wallet, in JSON-RPC shape.
///
/// Wallets surface failures inconsistently (some only set a message, some only a code), so every
/// classifier below looks at both.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct WalletError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            RPC_METHOD_NOT_FOUND,
            format!("the method {method} does not exist/is not available"),
        )
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == Some(RPC_METHOD_NOT_FOUND)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(RPC_USER_REJECTED) || message_is_user_rejection(&self.message)
    }

    pub fn is_insufficient_funds(&self) -> bool {
        message_is_insufficient_funds(&self.message)
    }
}

impl From<eyre::Report> for WalletError {
    fn from(e: eyre::Report) -> Self {
        Self::message(format!("{e:#}"))
    }
}

pub fn message_is_user_rejection(message: &str) -> bool {
    let s = message.to_lowercase();
    s.contains("user rejected")
        || s.contains("user denied")
        || s.contains("rejected the request")
        || s.contains("user cancelled")
        || s.contains("user canceled")
}

pub fn message_is_insufficient_funds(message: &str) -> bool {
    let s = message.to_lowercase();
    s.contains("insufficient funds") || s.contains("insufficient balance")
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("no connected account")]
    NoAccount,

    #[error("no calls to execute")]
    EmptyBatch,

    #[error("unknown chain id {0}")]
    UnknownChain(u64),

    #[error("no routes found for the selected tokens")]
    NoRoutes,

    #[error("transaction rejected by user")]
    UserRejected,

    #[error("insufficient funds on {chain}")]
    InsufficientFunds { chain: String },

    #[error("failed to switch to {chain}: {message}")]
    ChainSwitch { chain: String, message: String },

    #[error("execution failed on {chain}: {message}")]
    Execution { chain: String, message: String },

    /// A sequential batch failed after some of its transactions had already confirmed.
    /// `confirmed` holds their hashes and fees, with `success: false` and the failure message.
    #[error("{cause} after {} confirmed transaction(s)", .confirmed.tx_hashes.len())]
    PartiallyExecuted {
        cause: Box<BatchError>,
        confirmed: Box<ExecutionResult>,
    },
}

impl BatchError {
    /// Map a wallet or RPC failure to a user-facing error for `chain`.
    pub fn classify(chain: &str, err: &WalletError) -> Self {
        if err.is_user_rejection() {
            return Self::UserRejected;
        }
        if err.is_insufficient_funds() {
            return Self::InsufficientFunds {
                chain: chain.to_owned(),
            };
        }
        Self::Execution {
            chain: chain.to_owned(),
            message: err.message.clone(),
        }
    }

    pub fn classify_report(chain: &str, err: &eyre::Report) -> Self {
        Self::classify(chain, &WalletError::message(format!("{err:#}")))
    }

    /// Stable short code for machine-readable CLI output.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoAccount => "no_account",
            Self::EmptyBatch => "empty_batch",
            Self::UnknownChain(_) => "unknown_chain",
            Self::NoRoutes => "no_routes",
            Self::UserRejected => "user_rejected",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::ChainSwitch { .. } => "chain_switch_failed",
            Self::Execution { .. } => "execution_failed",
            Self::PartiallyExecuted { .. } => "partially_executed",
        }
    }

    /// Transactions that landed on chain before the failure, if any.
    pub fn confirmed(&self) -> Option<&ExecutionResult> {
        match self {
            Self::PartiallyExecuted { confirmed, .. } => Some(&**confirmed),
            _ => None,
        }
    }
}
