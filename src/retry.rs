//! Retry classification and exponential backoff for source calls.
//!
//! A failed source call is classified into a [`FailureType`]; the
//! [`RetryPolicy`] then decides whether the signal gets another attempt
//! and how long to wait first.
//!
//! ```
//! use journal_matcher_core::retry::{RetryDecision, RetryPolicy};
//! use journal_matcher_core::source::SourceError;
//!
//! let policy = RetryPolicy::default();
//! let error = SourceError::http_status("/sources", 503, None);
//!
//! match policy.decide(&error, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("retrying in {delay:?} (attempt {attempt})");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::source::SourceError;

/// Default attempts per signal: the initial call plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default base delay for the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to computed delays.
const MAX_JITTER: Duration = Duration::from_millis(100);

/// Classification of a source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on retry (5xx, 408, network, timeout).
    Transient,

    /// Will not succeed on retry (most 4xx, malformed bodies).
    Permanent,

    /// HTTP 429; retried after the server's Retry-After hint when present.
    RateLimited,
}

/// Decision on whether to retry a failed source call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay`.
    Retry {
        delay: Duration,
        /// Attempt number of the retry (1-indexed, first retry is 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry { reason: String },
}

/// Exponential backoff policy.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is raised to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Policy with custom attempts and base delay, other settings default.
    #[must_use]
    pub fn with_attempts(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed with `failure_type`.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Like [`should_retry`](Self::should_retry) but classifies `error` and
    /// stretches the delay to honor a Retry-After hint on rate limiting.
    #[must_use]
    pub fn decide(&self, error: &SourceError, attempt: u32) -> RetryDecision {
        let failure_type = classify_error(error);
        match self.should_retry(failure_type, attempt) {
            RetryDecision::Retry { delay, attempt } if failure_type == FailureType::RateLimited => {
                let delay = error.retry_after().map_or(delay, |hint| hint.max(delay));
                RetryDecision::Retry { delay, attempt }
            }
            decision => decision,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + Self::calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter() -> Duration {
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=MAX_JITTER.as_millis() as u64))
    }
}

/// Runs `call` until it succeeds or `policy` gives up.
///
/// Returns the final result together with the number of attempts made.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> (Result<T, SourceError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return (Ok(value), attempt),
            Err(error) => match policy.decide(&error, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        call = label,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Source call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(call = label, attempt, %reason, "Source call not retried");
                    return (Err(error), attempt);
                }
            },
        }
    }
}

/// Classifies a source error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 408, 5xx | Transient |
/// | HTTP 429 | RateLimited |
/// | other HTTP | Permanent |
/// | Timeout, Network | Transient |
/// | Decode, ClientBuild | Permanent |
#[must_use]
pub fn classify_error(error: &SourceError) -> FailureType {
    match error {
        SourceError::HttpStatus { status, .. } => classify_http_status(*status),
        SourceError::Timeout { .. } | SourceError::Network { .. } => FailureType::Transient,
        SourceError::Decode { .. } | SourceError::ClientBuild { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_allows_one_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 2);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_attempts(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_permanent_never_retries() {
        let policy = RetryPolicy::with_attempts(5, Duration::from_millis(10));
        let RetryDecision::DoNotRetry { reason } = policy.should_retry(FailureType::Permanent, 1)
        else {
            panic!("permanent failure retried");
        };
        assert!(reason.contains("permanent"));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(250), Duration::from_secs(1), 2.0);
        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_millis(250));
        assert!(first <= Duration::from_millis(350));

        let second = policy.calculate_delay(2);
        assert!(second >= Duration::from_millis(500));
        assert!(second <= Duration::from_millis(600));

        let capped = policy.calculate_delay(8);
        assert!(capped >= Duration::from_secs(1));
        assert!(capped <= Duration::from_millis(1100));
    }

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..100 {
            assert!(RetryPolicy::calculate_jitter() <= MAX_JITTER);
        }
    }

    #[test]
    fn test_classify_http_statuses() {
        let cases = [
            (400, FailureType::Permanent),
            (404, FailureType::Permanent),
            (408, FailureType::Transient),
            (429, FailureType::RateLimited),
            (500, FailureType::Transient),
            (503, FailureType::Transient),
            (599, FailureType::Transient),
            (302, FailureType::Permanent),
        ];
        for (status, expected) in cases {
            let error = SourceError::http_status("/sources", status, None);
            assert_eq!(classify_error(&error), expected, "status {status}");
        }
    }

    #[test]
    fn test_classify_transport_and_decode() {
        assert_eq!(
            classify_error(&SourceError::Timeout {
                endpoint: "/works".to_string()
            }),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&SourceError::network("/works", "connection reset")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&SourceError::decode("/works", "missing field")),
            FailureType::Permanent
        );
    }

    #[test]
    fn test_decide_honors_retry_after_on_rate_limit() {
        let policy = RetryPolicy::default();
        let error = SourceError::http_status("/sources", 429, Some(Duration::from_secs(3)));
        let RetryDecision::Retry { delay, attempt } = policy.decide(&error, 1) else {
            panic!("rate limit not retried");
        };
        assert_eq!(delay, Duration::from_secs(3));
        assert_eq!(attempt, 2);
    }

    #[test]
    fn test_decide_ignores_retry_after_hint_for_permanent() {
        let policy = RetryPolicy::default();
        let error = SourceError::http_status("/sources", 400, Some(Duration::from_secs(3)));
        assert!(matches!(
            policy.decide(&error, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_recovers_after_transient_failure() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let (result, attempts) = call_with_retry(&policy, "test", || {
            calls += 1;
            let outcome = if calls == 1 {
                Err(SourceError::http_status("/sources", 502, None))
            } else {
                Ok(7)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_stops_on_permanent_failure() {
        let policy = RetryPolicy::with_attempts(5, Duration::from_millis(10));
        let mut calls = 0;
        let (result, attempts): (Result<(), _>, _) = call_with_retry(&policy, "test", || {
            calls += 1;
            async { Err(SourceError::decode("/works", "bad body")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let (result, attempts): (Result<(), _>, _) = call_with_retry(&policy, "test", || async {
            Err(SourceError::network("/works", "connection refused"))
        })
        .await;
        assert!(matches!(result, Err(SourceError::Network { .. })));
        assert_eq!(attempts, 2);
    }
}
