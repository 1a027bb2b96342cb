//! Retry with exponential backoff for transient dispatch failures.
//!
//! The benchmark normally runs with retries off: a failed batch fails the run.
//! When enabled, the whole ordered dispatch is re-run, which keeps the output
//! order guarantee trivially intact.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one.
    pub max_retries: u32,
    /// Base delay between retries (doubled every attempt).
    pub base_delay: Duration,
    /// Upper bound for a single delay before jitter.
    pub max_delay: Duration,
    /// Add 0-50% random jitter to every delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Outcome of [`retry_async`].
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The last attempt's result.
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries needed).
    pub attempts: u32,
    /// Wall time spent on all attempts and backoff sleeps.
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of retries. `operation` receives the zero-based attempt number.
pub async fn retry_async<T, E, F, Fut, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        let result = operation(attempt).await;
        let retry = match &result {
            Ok(_) => false,
            Err(err) => attempt < config.max_retries && is_retryable(err),
        };
        if !retry {
            return RetryResult {
                result,
                attempts: attempt + 1,
                total_duration: start.elapsed(),
            };
        }

        let delay = calculate_delay(config, attempt);
        if let Err(err) = &result {
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying_after_failure"
            );
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter {
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick() -> RetryConfig {
        RetryConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let outcome = retry_async(&quick(), |_: &String| true, |_| {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.into_result().unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let outcome: RetryResult<(), String> = retry_async(
            &quick().with_max_retries(2),
            |_| true,
            |_| async { Err("always fails".to_string()) },
        )
        .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let outcome: RetryResult<(), String> =
            retry_async(&quick(), |_| false, |_| async { Err("bad request".to_string()) }).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn none_makes_a_single_attempt() {
        let outcome: RetryResult<(), String> =
            retry_async(&RetryConfig::none(), |_| true, |_| async { Err("x".to_string()) }).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350))
            .with_jitter(false);
        assert_eq!(calculate_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(calculate_delay(&config, 2), Duration::from_millis(350));
        assert_eq!(calculate_delay(&config, 40), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_half_the_delay() {
        let config = RetryConfig::default().with_base_delay(Duration::from_millis(100));
        for _ in 0..100 {
            let delay = calculate_delay(&config, 0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
