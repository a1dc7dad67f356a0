//! Bounded retry with capped, jittered exponential backoff.
//!
//! Only `RateLimited` and `Timeout` are retried; a rejected credential or
//! a schema mismatch fails immediately. Jitter spreads concurrently
//! retrying jobs so they do not hammer the API in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use articleforge_shared::{ArticleForgeError, RetryConfig};

/// A final error after retry resolution, tagged with the attempt count.
#[derive(Debug)]
pub struct Exhausted {
    /// The last observed error.
    pub error: ArticleForgeError,
    /// Attempts made (1 for a non-retryable first failure,
    /// `max_attempts` when retryable errors were exhausted).
    pub attempts: u32,
}

/// Retry policy: attempt bound plus backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
    }

    /// Maximum attempts per operation, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may be dispatched after `attempt` failed.
    pub fn attempts_remain(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Deterministic backoff component before attempt `attempt + 1`:
    /// doubles from `base_delay`, capped at `max_delay`. Monotonically
    /// non-decreasing in `attempt`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Backoff before attempt `attempt + 1`, with additive jitter of up to
    /// half the deterministic component.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter_cap = base.as_millis() as u64 / 2;
        if jitter_cap == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        base + Duration::from_millis(jitter)
    }

    /// Run `op` under this policy. The closure receives the 1-based
    /// attempt number. Retries only retryable errors while attempts
    /// remain, sleeping the backoff delay between attempts.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, Exhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ArticleForgeError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && self.attempts_remain(attempt) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(Exhausted {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
