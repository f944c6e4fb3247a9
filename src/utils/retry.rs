//! Retry policy and backoff helpers
//!
//! [`RetryConfig`] is the `[retry]` section of the configuration. The
//! scheduler asks it how many attempts a given [`ErrorKind`] is allowed and
//! how long to wait before re-enqueueing; the API client uses
//! [`with_retry_if`] for its own short transport-level retries.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ErrorKind;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries for network and API failures
    pub max_attempts: u32,

    /// Maximum number of retries for parse failures (usually smaller)
    pub parse_max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            parse_max_attempts: 1,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Outcome of asking the policy about a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after `delay`; the task's attempt count becomes `attempt`
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted or error not retryable
    GiveUp,
}

impl RetryConfig {
    /// Create a new retry configuration with custom max attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays
    pub fn with_delays(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            ..Default::default()
        }
    }

    /// Number of retries allowed for an error kind
    ///
    /// Parse failures may indicate a schema change on the provider side, so
    /// they get the smaller of the two limits. Configuration errors get none.
    pub fn attempt_limit(&self, kind: ErrorKind) -> u32 {
        match kind {
            ErrorKind::Network | ErrorKind::Api => self.max_attempts,
            ErrorKind::Parse => self.parse_max_attempts.min(self.max_attempts),
            ErrorKind::Configuration => 0,
        }
    }

    /// Decide what to do with a task that failed with `kind` after
    /// `attempt_count` retries
    pub fn decide(&self, kind: ErrorKind, attempt_count: u32) -> RetryDecision {
        if attempt_count >= self.attempt_limit(kind) {
            return RetryDecision::GiveUp;
        }

        let attempt = attempt_count + 1;
        RetryDecision::Retry {
            attempt,
            delay: self.calculate_delay(attempt),
        }
    }

    /// Calculate delay for a given attempt using exponential backoff
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }
}

/// Execute an operation with retry logic, using a custom retry predicate
///
/// `retries` bounds the number of extra attempts; delays come from `config`.
/// Errors for which `should_retry` returns false are returned immediately.
///
/// # Example
///
/// ```no_run
/// use farecrawl::utils::retry::{with_retry_if, RetryConfig};
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let config = RetryConfig::default();
/// let value = with_retry_if(
///     &config,
///     2,
///     || async { Ok::<_, std::io::Error>(42) },
///     |e| e.kind() == std::io::ErrorKind::TimedOut,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    retries: u32,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        // Apply exponential backoff for retries
        if attempt > 0 {
            let delay = config.calculate_delay(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis(),
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }

                if attempt >= retries {
                    warn!(attempts = attempt + 1, error = %e, "Retries exhausted");
                    return Err(e);
                }

                warn!(
                    attempt = attempt,
                    max_retries = retries,
                    error = %e,
                    "Operation failed, will retry"
                );
                attempt += 1;
            }
        }
    }
}
