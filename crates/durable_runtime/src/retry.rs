//! Activity execution with retry and backoff

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ActivityError, WorkflowFault};

/// Retry policy for activities
///
/// The delay after the n-th failed attempt is
/// `initial_interval * backoff_coefficient^(n-1)`, capped at `maximum_interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Growth factor applied per attempt
    pub backoff_coefficient: f64,
    /// Maximum delay cap
    pub maximum_interval: Duration,
    /// Maximum number of attempts, including the first one
    pub maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Default::default()
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(
        maximum_attempts: u32,
        initial_interval: Duration,
        maximum_interval: Duration,
    ) -> Self {
        Self {
            initial_interval,
            backoff_coefficient: 2.0,
            maximum_interval,
            maximum_attempts,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.backoff_coefficient.max(1.0).powi(exponent);
        let delay_secs = self.initial_interval.as_secs_f64() * factor;
        let cap_secs = self.maximum_interval.as_secs_f64();

        Duration::from_secs_f64(delay_secs.min(cap_secs).max(0.0))
    }

    /// Check if another attempt is allowed after `attempt` attempts have failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.maximum_attempts.max(1)
    }
}

/// Options applied to every activity invocation of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOptions {
    /// Bound on the total time spent on the activity, retries and backoff included
    pub start_to_close_timeout: Duration,
    /// Per-attempt retry policy
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(5 * 60),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ActivityOptions {
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }
}

/// Runs an activity until it succeeds, fails permanently, exhausts its
/// attempts, or runs out of time.
///
/// `operation` receives the 1-indexed attempt number. It must be safe to
/// invoke more than once with the same inputs.
pub async fn run_activity<T, F, Fut>(
    name: &str,
    options: &ActivityOptions,
    mut operation: F,
) -> Result<T, WorkflowFault>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ActivityError>>,
{
    let policy = &options.retry_policy;

    let attempts = async {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(activity = name, attempt, "Activity succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(ActivityError::NonRetryable(message)) => {
                    error!(activity = name, attempt, error = %message, "Activity failed permanently");
                    return Err(WorkflowFault::NonRetryable {
                        activity: name.to_string(),
                        message,
                    });
                }
                Err(ActivityError::Retryable(message)) => {
                    if !policy.should_retry(attempt) {
                        error!(activity = name, attempt, error = %message, "Activity retries exhausted");
                        return Err(WorkflowFault::RetriesExhausted {
                            activity: name.to_string(),
                            attempts: attempt,
                            last_error: message,
                        });
                    }
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        activity = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Activity failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    };

    match tokio::time::timeout(options.start_to_close_timeout, attempts).await {
        Ok(result) => result,
        Err(_) => {
            error!(activity = name, "Activity timed out");
            Err(WorkflowFault::Timeout {
                activity: name.to_string(),
                timeout_ms: options.start_to_close_timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_options(max_attempts: u32) -> ActivityOptions {
        ActivityOptions::default().with_retry_policy(RetryPolicy::exponential(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
        ))
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(200), Duration::from_secs(60));
    }

    #[test]
    fn test_should_retry_is_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let calls = AtomicU32::new(0);
        let result = run_activity("flaky", &fast_options(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ActivityError::retryable("connection reset"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_activity("down", &fast_options(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ActivityError::retryable("database unavailable")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result,
            Err(WorkflowFault::RetriesExhausted {
                activity: "down".to_string(),
                attempts: 4,
                last_error: "database unavailable".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_non_retryable_fails_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_activity("bad-input", &fast_options(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ActivityError::non_retryable("currency mismatch")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(WorkflowFault::NonRetryable { .. })));
    }

    #[tokio::test]
    async fn test_total_timeout() {
        let options = ActivityOptions::default()
            .with_timeout(Duration::from_millis(20))
            .with_retry_policy(RetryPolicy::exponential(
                100,
                Duration::from_millis(50),
                Duration::from_millis(50),
            ));

        let result: Result<(), _> = run_activity("slow", &options, |_| async {
            Err(ActivityError::retryable("still down"))
        })
        .await;

        assert!(matches!(result, Err(WorkflowFault::Timeout { .. })));
    }
}
