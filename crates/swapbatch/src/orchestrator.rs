use crate::{
    calls::{build_calls_from_routes, BuildContext},
    dispatch::{split_calls, Dispatcher, ExecuteOptions, ProgressFn},
    errors::BatchError,
    quote::{QuoteRequest, RouteResolver},
    status::{BatchStatus, StatusReporter},
    types::{ExecutionMethod, ExecutionResult, Route},
};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Group routes by source chain, keeping first-appearance order of chains and routes.
pub fn group_by_chain(routes: Vec<Arc<Route>>) -> Vec<(u64, Vec<Arc<Route>>)> {
    let mut groups: Vec<(u64, Vec<Arc<Route>>)> = vec![];
    for route in routes {
        match groups.iter_mut().find(|(c, _)| *c == route.from_chain_id) {
            Some((_, g)) => g.push(route),
            None => groups.push((route.from_chain_id, vec![route])),
        }
    }
    groups
}

/// Quotes a selection, then executes it chain by chain.
pub struct BatchSwapper {
    resolver: Arc<RouteResolver>,
    dispatcher: Arc<Dispatcher>,
    status: Arc<StatusReporter>,
    settle: Duration,
    on_progress: Option<ProgressFn>,
    force_method: Option<ExecutionMethod>,
}

impl std::fmt::Debug for BatchSwapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSwapper")
            .field("dispatcher", &self.dispatcher)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl BatchSwapper {
    pub fn new(
        resolver: Arc<RouteResolver>,
        dispatcher: Arc<Dispatcher>,
        status: Arc<StatusReporter>,
        settle: Duration,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            status,
            settle,
            on_progress: None,
            force_method: None,
        }
    }

    /// Dispatch every chunk with `method` instead of the detected preference.
    #[must_use]
    pub fn with_force_method(mut self, method: ExecutionMethod) -> Self {
        self.force_method = Some(method);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn status(&self) -> &Arc<StatusReporter> {
        &self.status
    }

    fn fail(&self, e: BatchError) -> BatchError {
        self.status.set(BatchStatus::Failed {
            message: e.to_string(),
        });
        e
    }

    /// Quote every selection and execute the resulting routes, one source chain at a time.
    /// Stops at the first chain that fails.
    pub async fn execute(
        &self,
        selections: &[QuoteRequest],
    ) -> Result<Vec<ExecutionResult>, BatchError> {
        let detector = self.dispatcher.detector();
        let registry = self.dispatcher.registry();
        let wallet = detector.wallet();

        self.status.set(BatchStatus::CheckingCapabilities);
        let Some(account) = wallet.account() else {
            return Err(self.fail(BatchError::NoAccount));
        };
        detector.snapshot_for(wallet.chain_id()).await;

        self.status.set(BatchStatus::FetchingRoutes);
        let routes: Vec<Arc<Route>> = self
            .resolver
            .quote_all(selections)
            .await
            .into_iter()
            .flatten()
            .map(|o| o.route)
            .collect();
        if routes.is_empty() {
            return Err(self.fail(BatchError::NoRoutes));
        }

        let opts = ExecuteOptions {
            force_method: self.force_method,
            on_progress: self.on_progress.clone(),
            status: Some(Arc::clone(&self.status)),
        };
        // Resolve every source chain up front so an unknown one fails before anything is sent.
        let mut groups = vec![];
        for (chain_id, group) in group_by_chain(routes) {
            let chain = match (registry.get(chain_id), detector.chains().get(chain_id)) {
                (Some(_), Some(chain)) => chain,
                _ => return Err(self.fail(BatchError::UnknownChain(chain_id))),
            };
            groups.push((chain_id, chain, group));
        }

        let mut results = vec![];
        for (chain_id, chain, group) in groups {
            let label = registry.label(chain_id);

            if wallet.chain_id() != chain_id {
                self.status.set(BatchStatus::SwitchingChain {
                    chain: label.clone(),
                });
                if let Err(e) = wallet.switch_chain(chain_id).await {
                    let err = if e.is_user_rejection() {
                        BatchError::UserRejected
                    } else {
                        BatchError::ChainSwitch {
                            chain: label.clone(),
                            message: e.message,
                        }
                    };
                    return Err(self.fail(err));
                }
                tokio::time::sleep(self.settle).await;
            }

            let ctx = BuildContext {
                sender: account,
                routing: self.resolver.routing().as_ref(),
                chain: chain.as_ref(),
            };
            let calls = build_calls_from_routes(&group, chain_id, &ctx).await;
            self.status.set(BatchStatus::PreparingCalls {
                chain: label.clone(),
                count: calls.len(),
            });
            if calls.is_empty() {
                warn!(chain_id, routes = group.len(), "no executable calls for chain, skipping");
                continue;
            }

            let snapshot = detector.snapshot_for(chain_id).await;
            let chunks = split_calls(&calls, snapshot.max_batch_size);
            info!(
                chain_id,
                calls = calls.len(),
                batches = chunks.len(),
                max_batch_size = snapshot.max_batch_size,
                "executing chain group"
            );
            for chunk in chunks {
                match self.dispatcher.execute_batch(&chunk, chain_id, &opts).await {
                    Ok(r) => results.push(r),
                    Err(e) => return Err(self.fail(e)),
                }
            }
        }

        self.status.set(BatchStatus::Complete {
            results: results.len(),
        });
        Ok(results)
    }
}
