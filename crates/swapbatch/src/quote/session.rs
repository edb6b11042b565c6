use crate::{
    config::QuotingConfig,
    quote::{QuoteOutcome, QuoteRequest, RouteResolver},
    types::Route,
};
use futures::future::join_all;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{sleep_until, Instant},
};

#[derive(Debug, Clone)]
pub enum QuoteState {
    Loading,
    Ready(QuoteOutcome),
    NoRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Committed {
        round: u64,
        ready: usize,
        no_route: usize,
    },
    /// A newer round started; this round's results were dropped.
    Superseded { round: u64 },
}

/// Identity of one quoting round. Results are only committed while the round is the latest.
#[derive(Debug, Clone)]
pub struct RoundToken {
    id: u64,
    latest: watch::Receiver<u64>,
}

impl RoundToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        *self.latest.borrow() == self.id
    }

    /// Sleep until `deadline`. Returns `false` early if a newer round starts first.
    pub async fn wait_until(&self, deadline: Instant) -> bool {
        let mut rx = self.latest.clone();
        let id = self.id;
        tokio::select! {
            () = sleep_until(deadline) => self.is_current(),
            _ = rx.wait_for(|v| *v != id) => false,
        }
    }
}

/// Per-token quote state for an interactive selection, refreshed in rounds.
pub struct QuoteSession {
    resolver: Arc<RouteResolver>,
    latest: watch::Sender<u64>,
    /// State per token key, tagged with the round that wrote it.
    states: Mutex<HashMap<String, (u64, QuoteState)>>,
    debounce: Duration,
    min_loading: Duration,
}

impl std::fmt::Debug for QuoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSession")
            .field("round", &*self.latest.borrow())
            .field("debounce", &self.debounce)
            .field("min_loading", &self.min_loading)
            .finish_non_exhaustive()
    }
}

impl QuoteSession {
    pub fn new(resolver: Arc<RouteResolver>, cfg: &QuotingConfig) -> Self {
        Self::with_timing(
            resolver,
            Duration::from_millis(cfg.debounce_ms),
            Duration::from_millis(cfg.min_loading_ms),
        )
    }

    pub fn with_timing(
        resolver: Arc<RouteResolver>,
        debounce: Duration,
        min_loading: Duration,
    ) -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            resolver,
            latest,
            states: Mutex::new(HashMap::new()),
            debounce,
            min_loading,
        }
    }

    fn states(&self) -> std::sync::MutexGuard<'_, HashMap<String, (u64, QuoteState)>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new round, superseding any in flight.
    pub fn begin_round(&self) -> RoundToken {
        self.latest.send_modify(|v| *v = v.wrapping_add(1));
        RoundToken {
            id: *self.latest.borrow(),
            latest: self.latest.subscribe(),
        }
    }

    pub fn state(&self, token_key: &str) -> Option<QuoteState> {
        self.states().get(token_key).map(|(_, s)| s.clone())
    }

    /// Routes currently in `Ready` state.
    pub fn ready_routes(&self) -> Vec<Arc<Route>> {
        self.states()
            .values()
            .filter_map(|(_, s)| match s {
                QuoteState::Ready(o) => Some(Arc::clone(&o.route)),
                QuoteState::Loading | QuoteState::NoRoute => None,
            })
            .collect()
    }

    /// Drop state for tokens no longer selected.
    pub fn retain_tokens(&self, keep: &[String]) {
        self.states().retain(|k, _| keep.contains(k));
    }

    pub async fn refresh(&self, requests: &[QuoteRequest]) -> RoundOutcome {
        let round = self.begin_round();
        self.run_round(&round, requests).await
    }

    /// Refresh after the quiet period, unless another refresh starts meanwhile.
    pub async fn debounced_refresh(&self, requests: &[QuoteRequest]) -> RoundOutcome {
        let round = self.begin_round();
        if !round.wait_until(Instant::now() + self.debounce).await {
            tracing::debug!(round = round.id(), "debounced refresh superseded");
            return RoundOutcome::Superseded { round: round.id() };
        }
        self.run_round(&round, requests).await
    }

    async fn run_round(&self, round: &RoundToken, requests: &[QuoteRequest]) -> RoundOutcome {
        {
            let mut states = self.states();
            for r in requests {
                states.insert(r.token_key(), (round.id(), QuoteState::Loading));
            }
        }
        let held_until = Instant::now() + self.min_loading;
        let per_token = requests.iter().map(|r| async move {
            let outcome = self.resolver.get_route_quote(r).await;
            if !round.wait_until(held_until).await {
                return None;
            }
            let state = outcome.map_or(QuoteState::NoRoute, QuoteState::Ready);
            let ready = matches!(state, QuoteState::Ready(_));
            if round.is_current() {
                self.states().insert(r.token_key(), (round.id(), state));
                Some(ready)
            } else {
                None
            }
        });
        let applied = join_all(per_token).await;

        if !round.is_current() {
            // Tokens the newer round did not pick up would otherwise stay Loading.
            self.states()
                .retain(|_, (id, s)| *id != round.id() || !matches!(s, QuoteState::Loading));
            tracing::debug!(round = round.id(), "quote round superseded");
            return RoundOutcome::Superseded { round: round.id() };
        }
        let ready = applied.iter().filter(|a| **a == Some(true)).count();
        let no_route = applied.iter().filter(|a| **a == Some(false)).count();
        tracing::debug!(round = round.id(), ready, no_route, "quote round committed");
        RoundOutcome::Committed {
            round: round.id(),
            ready,
            no_route,
        }
    }
}
