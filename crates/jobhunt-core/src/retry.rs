use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::AppError;

/// Linear backoff with multiplicative jitter.
///
/// Delay before retry `n` (1-indexed) is `base_delay × n × U(0.8, 1.2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Sleep before the given retry, with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let nominal = self.base_delay * attempt.max(1);
        if nominal.is_zero() {
            return nominal;
        }
        let factor = rand::thread_rng().gen_range(0.8..=1.2);
        nominal.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        %what,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
