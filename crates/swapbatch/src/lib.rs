//! Capability-aware batch swap execution.
//!
//! Routes are quoted through a cached resolver, turned into approval and swap calls, and
//! dispatched per source chain using EIP-7702 delegated bundling, EIP-5792 `wallet_sendCalls`,
//! or one transaction at a time, depending on what the connected wallet supports.

#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

pub mod amount;
pub mod calls;
pub mod capability;
pub mod chains;
pub mod cli_output;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod fsutil;
pub mod kv;
pub mod orchestrator;
pub mod paths;
pub mod quote;
pub mod retry;
pub mod routing;
pub mod status;
pub mod store;
pub mod types;
pub mod wallet;
