//! Bounded exponential backoff for transient provider failures.

use crate::types::{RagError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy: at most `max_attempts` tries, sleeping
/// `base_delay * 2^n` (jittered, capped at `max_delay`) between them.
///
/// Only errors with [`RagError::is_retryable`] are retried; everything
/// else propagates immediately. The backoff sleeps are ordinary awaits,
/// so a surrounding `tokio::time::timeout` cancels the whole loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        // Jitter in [0.5, 1.0] spreads concurrent retries apart.
        let factor = rand::rng().random_range(0.5..=1.0);
        exp.mul_f64(factor)
    }

    /// Run `op`, retrying transient failures with backoff.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        // Unreachable in practice: the loop either returns a success, a
        // non-retryable error, or the final attempt's error.
        Err(last_err
            .unwrap_or_else(|| RagError::ProviderUnavailable("retries exhausted".into())))
    }
}
