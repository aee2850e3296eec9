//! Retry configuration, delay calculation, and the retry collaborator.
//!
//! The scheduler never retries on its own: a failed fetch is reported to
//! every waiter and forgotten. Callers that want retries use one of the two
//! shapes here:
//!
//! - [`with_retry()`]: loop in place, sleeping between attempts.
//! - [`RetryCoordinator`]: report a failure under an operation id; the
//!   coordinator classifies it, computes the backoff, and invokes the
//!   callback registered for that id once the delay has passed. Suits UI
//!   code that shows a notification and re-runs the preview later.
//!
//! Both use [`RetryConfig::delay_for_attempt`]:
//! `initial_delay * 2^attempt`, capped at `max_delay`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{HuginnError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

// ============================================================================
// In-place retry helper
// ============================================================================

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (as classified by [`HuginnError::is_transient()`])
/// up to `config.max_attempts`, using exponential backoff. Permanent errors
/// are returned immediately without retry.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts.max(1) {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < config.max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                        .increment(1);
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(last_err.unwrap_or(HuginnError::Cancelled))
}

// ============================================================================
// RetryCoordinator
// ============================================================================

/// Callback re-running an operation.
pub type RetryCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// What the coordinator did with a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The callback will run after `delay`. `attempt` is the 1-based retry
    /// number.
    Scheduled { attempt: u32, delay: Duration },
    /// `attempts` failures have been reported; no more retries.
    Exhausted { attempts: u32 },
    /// The error is permanent.
    NotRetryable,
    /// No callback is registered under this id.
    Unregistered,
}

struct Operation {
    callback: RetryCallback,
    failures: u32,
}

/// Operation-id keyed retry scheduler.
///
/// Register a callback per operation (e.g. one per preview panel), report
/// failures as they happen, and report success to reset the attempt count.
pub struct RetryCoordinator {
    config: RetryConfig,
    operations: Mutex<HashMap<String, Operation>>,
}

impl RetryCoordinator {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            operations: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn operations(&self) -> MutexGuard<'_, HashMap<String, Operation>> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or replace) the callback that re-runs `op_id`.
    pub fn register<F, Fut>(&self, op_id: impl Into<String>, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: RetryCallback = Arc::new(move || -> BoxFuture<'static, ()> {
            Box::pin(callback())
        });
        self.operations().insert(
            op_id.into(),
            Operation {
                callback,
                failures: 0,
            },
        );
    }

    /// Forget `op_id`. Returns whether it was registered.
    pub fn unregister(&self, op_id: &str) -> bool {
        self.operations().remove(op_id).is_some()
    }

    /// Failures reported for `op_id` since registration or last success.
    pub fn failures(&self, op_id: &str) -> Option<u32> {
        self.operations().get(op_id).map(|op| op.failures)
    }

    /// Reset the failure count after the operation succeeded.
    pub fn report_success(&self, op_id: &str) {
        if let Some(op) = self.operations().get_mut(op_id) {
            op.failures = 0;
        }
    }

    /// Classify a failure and, if it is transient and attempts remain,
    /// schedule the registered callback after the backoff delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn report_failure(&self, op_id: &str, error: &HuginnError) -> RetryDecision {
        if !error.is_transient() {
            debug!(op_id, error = %error, "not retrying permanent error");
            return RetryDecision::NotRetryable;
        }

        let (callback, attempt, delay) = {
            let mut operations = self.operations();
            let Some(op) = operations.get_mut(op_id) else {
                return RetryDecision::Unregistered;
            };
            op.failures += 1;
            if op.failures >= self.config.max_attempts {
                warn!(op_id, attempts = op.failures, error = %error, "retries exhausted");
                return RetryDecision::Exhausted {
                    attempts: op.failures,
                };
            }
            let attempt = op.failures;
            let delay = self.config.delay_for_attempt(attempt - 1);
            (Arc::clone(&op.callback), attempt, delay)
        };

        metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => "coordinated").increment(1);
        warn!(
            op_id,
            attempt,
            max_attempts = self.config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "scheduling retry"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback().await;
        });
        RetryDecision::Scheduled { attempt, delay }
    }
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::new().initial_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn disabled_is_single_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
