use crate::error::{OnboardingError, ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Whether a provider error is safe to retry without altering semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// Classifies a provider error code.
///
/// Transient codes cover temporary lock contention, rate limiting,
/// idempotency-key collisions, resources not yet visible due to eventual
/// consistency, and connection/server-side hiccups. `account_invalid` is
/// deliberately fatal: retrying cannot fix a rejected submission.
pub fn classify(error: &ProviderError) -> ErrorClass {
    match error.code.as_str() {
        "lock_timeout"
        | "rate_limit"
        | "idempotency_key_in_use"
        | "resource_missing"
        | "api_connection_error"
        | "api_error" => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Translates a fatal provider error for the caller.
///
/// Validation-shaped errors pass through with their field name; everything
/// else is wrapped opaquely so provider internals never leak.
pub fn translate_fatal(error: ProviderError) -> OnboardingError {
    if error.is_validation_shaped() {
        OnboardingError::Validation {
            field: error.param.unwrap_or_default(),
            message: error.message,
        }
    } else {
        warn!(code = %error.code, "fatal provider error");
        OnboardingError::Unknown
    }
}

/// Bounded exponential backoff. The delay before retry `n` is
/// `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        exp.min(self.max_delay)
    }
}

/// Runs remote operations, absorbing transient failures up to the policy's
/// attempt bound and translating fatal ones. A cancellation token aborts
/// pending retries between attempts and during backoff sleeps.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Executes `operation` until it succeeds, fails fatally, is cancelled,
    /// or the attempt bound is exhausted. Exhaustion surfaces the last
    /// transient error inside `RetriesExhausted`.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(OnboardingError::Cancelled);
            }

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == ErrorClass::Fatal {
                return Err(translate_fatal(error));
            }

            attempt += 1;
            if attempt >= self.policy.max_attempts {
                return Err(OnboardingError::RetriesExhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            warn!(
                code = %error.code,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "transient provider error, backing off"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(OnboardingError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
