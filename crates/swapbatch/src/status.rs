use crate::types::ExecutionMethod;
use serde::Serialize;
use std::{
    fmt,
    sync::{Mutex, PoisonError},
};
use tokio::sync::watch;

/// Phase of a multi-chain batch, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BatchStatus {
    Idle,
    CheckingCapabilities,
    FetchingRoutes,
    SwitchingChain { chain: String },
    PreparingCalls { chain: String, count: usize },
    Signing { chain: String, method: ExecutionMethod },
    WaitingForConfirmation { chain: String },
    Complete { results: usize },
    Failed { message: String },
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::CheckingCapabilities => f.write_str("checking wallet capabilities"),
            Self::FetchingRoutes => f.write_str("fetching routes"),
            Self::SwitchingChain { chain } => write!(f, "switching to {chain}"),
            Self::PreparingCalls { chain, count } => {
                write!(f, "preparing {count} calls on {chain}")
            }
            Self::Signing { chain, method } => write!(f, "signing on {chain} ({method})"),
            Self::WaitingForConfirmation { chain } => {
                write!(f, "waiting for confirmation on {chain}")
            }
            Self::Complete { results } => write!(f, "complete ({results} batches)"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Publishes status changes to watchers and the log; keeps the sequence for inspection.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<BatchStatus>,
    history: Mutex<Vec<BatchStatus>>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BatchStatus::Idle);
        Self {
            tx,
            history: Mutex::new(vec![]),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchStatus> {
        self.tx.subscribe()
    }

    /// Publish `status`. `CheckingCapabilities` opens a new run and clears the history.
    pub fn set(&self, status: BatchStatus) {
        tracing::info!(status = %status, "batch status");
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if status == BatchStatus::CheckingCapabilities {
            history.clear();
        }
        history.push(status.clone());
        drop(history);
        self.tx.send_replace(status);
    }

    pub fn current(&self) -> BatchStatus {
        self.tx.borrow().clone()
    }

    pub fn history(&self) -> Vec<BatchStatus> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchers_see_the_latest_phase() {
        let r = StatusReporter::new();
        let rx = r.subscribe();
        r.set(BatchStatus::FetchingRoutes);
        r.set(BatchStatus::PreparingCalls {
            chain: "Base".into(),
            count: 3,
        });
        assert_eq!(rx.borrow().to_string(), "preparing 3 calls on Base");
        assert_eq!(r.history().len(), 2);
    }

    #[test]
    fn history_covers_only_the_latest_run() {
        let r = StatusReporter::new();
        for _ in 0..2 {
            r.set(BatchStatus::CheckingCapabilities);
            r.set(BatchStatus::FetchingRoutes);
            r.set(BatchStatus::Complete { results: 1 });
        }
        assert_eq!(
            r.history(),
            vec![
                BatchStatus::CheckingCapabilities,
                BatchStatus::FetchingRoutes,
                BatchStatus::Complete { results: 1 },
            ]
        );
    }
}
