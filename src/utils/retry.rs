// Retry with exponential backoff for transient failures

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::types::SynthesisError;

/// Errors that can tell a transient failure from a permanent one
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for SynthesisError {
    fn is_transient(&self) -> bool {
        matches!(self, SynthesisError::Transient(_))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total number of attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as i32;
        let max_ms = self.config.max_delay.as_millis() as f64;
        let base_ms = self.config.base_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped = base_ms.min(max_ms);

        let millis = if self.config.jitter && capped > 0.0 {
            // up to 10% either way
            let spread = capped * 0.1;
            let jittered = capped + rand::thread_rng().gen_range(-spread..=spread);
            jittered.clamp(0.0, max_ms)
        } else {
            capped
        };
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy runs out
/// of retries. The last error is returned.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !error.is_transient() {
                    debug!(attempt, error = %error, "Permanent failure, not retrying");
                    return Err(error);
                }
                if attempt >= policy.max_attempts() {
                    warn!(attempts = attempt, error = %error, "Retries exhausted");
                    return Err(error);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
