//! Retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::ExchangeError;
use crate::config::RetryConfig;

/// Bounded retry for transient exchange errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Run `call` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, ExchangeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        self.run_when(op, ExchangeError::is_transient, call).await
    }

    /// Like [`run`](Self::run), retrying only errors accepted by `retryable`.
    /// Orders use [`ExchangeError::is_rate_limit`]: a timed-out order may
    /// have been accepted.
    pub async fn run_when<T, F, Fut>(
        &self,
        op: &'static str,
        retryable: fn(&ExchangeError) -> bool,
        mut call: F,
    ) -> Result<T, ExchangeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let mut attempt = 1;
        let mut delay = self.initial_delay;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt < self.max_attempts => {
                    tracing::warn!(
                        op,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient exchange error, retrying"
                    );
                    metrics::counter!("trader_exchange_retries_total", "op" => op).increment(1);

                    sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                }
                Err(e) => {
                    if retryable(&e) {
                        tracing::error!(op, attempts = attempt, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
