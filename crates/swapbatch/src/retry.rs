use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Number of full rounds. Each round tries every endpoint once.
    pub rounds: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter (`0..=jitter_max_ms`) added to each backoff sleep.
    pub jitter_max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(4),
            jitter_max_ms: 250,
        }
    }
}

impl BackoffConfig {
    /// A single pass over the endpoints, no sleeping. Used for probes where the caller already
    /// degrades failures.
    pub const fn single_pass() -> Self {
        Self {
            rounds: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_max_ms: 0,
        }
    }

    fn delay_for_round(&self, round: usize) -> Duration {
        let shift = u32::try_from(round.min(16)).unwrap_or(16_u32);
        let pow2 = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let ms = base_ms.saturating_mul(pow2).min(max_ms);
        let jitter = if cfg!(test) || self.jitter_max_ms == 0 {
            0
        } else {
            rand::random::<u64>() % self.jitter_max_ms.saturating_add(1).max(1)
        };
        Duration::from_millis(ms.saturating_add(jitter))
    }
}

/// Try `op(item)` across all items, in order, for `rounds` rounds. Between rounds, sleep with
/// exponential backoff + jitter, but only after every item has failed.
pub async fn try_all_with_backoff<I, T, Fut>(
    items: &[I],
    cfg: &BackoffConfig,
    mut op: impl FnMut(&I) -> Fut + Send,
    context_label: &'static str,
) -> eyre::Result<T>
where
    I: Sync,
    Fut: std::future::Future<Output = eyre::Result<T>> + Send,
{
    if items.is_empty() {
        eyre::bail!("no endpoints configured");
    }
    if cfg.rounds == 0 {
        eyre::bail!("invalid backoff config: rounds=0");
    }

    let mut last_err: Option<eyre::Report> = None;
    for round in 0..cfg.rounds {
        for item in items {
            match op(item).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    tracing::debug!(round, error = %e, label = context_label, "endpoint attempt failed");
                    last_err = Some(e);
                }
            }
        }
        if round + 1 < cfg.rounds {
            tokio::time::sleep(cfg.delay_for_round(round)).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| eyre::eyre!("unknown error"))
        .wrap_err(context_label))
}
