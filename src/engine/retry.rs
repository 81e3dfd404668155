//! Bounded retry with exponential backoff and jitter
//!
//! Wraps a single upstream call. Classified-transient failures are retried up
//! to `max_attempts` total attempts; fatal classifications propagate on the
//! first failure. This backoff is error recovery only; the Historical poll
//! schedule grows independently of it.

use super::config::EngineConfig;
use super::error::{categorize_error, QueryError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryExecutor {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        assert!(max_attempts >= 1, "at least one attempt is required");
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            config.retry_base_delay,
            config.retry_max_delay,
        )
    }

    /// Run `call`, retrying transient failures.
    ///
    /// Exhausting the budget surfaces the last failure annotated with the
    /// attempt count.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut last_message = String::new();

        for attempt in 0..self.max_attempts {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "upstream call recovered after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let category = categorize_error(&error, operation);
                    if !category.is_retryable() {
                        warn!(
                            operation,
                            kind = category.short_label(),
                            "upstream call failed fatally: {}",
                            error
                        );
                        return Err(category.into_rejection());
                    }

                    last_message = error.to_string();
                    if attempt + 1 < self.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        debug!(
                            operation,
                            attempt,
                            kind = category.short_label(),
                            delay_ms = delay.as_millis() as u64,
                            "transient upstream failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            operation,
            attempts = self.max_attempts,
            "retry budget exhausted: {}",
            last_message
        );
        Err(QueryError::TransientUpstream {
            attempts: self.max_attempts,
            message: last_message,
        })
    }

    /// `base * 2^attempt + jitter`, capped at `max_delay`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter_ms = if base_ms > 0 {
            rand::thread_rng().gen_range(0..=base_ms)
        } else {
            0
        };
        Duration::from_millis(exp_ms.saturating_add(jitter_ms)).min(self.max_delay)
    }
}
