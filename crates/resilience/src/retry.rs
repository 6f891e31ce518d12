//! Bounded retry with exponential backoff.
//!
//! One [`RetryExecutor::execute`] call drives one logical operation: no fan
//! out, no state shared across invocations. The backoff wait is the only
//! place the executor suspends, and it always races the caller's
//! [`CancellationToken`].

use std::{error::Error, future::Future, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::classify::{ErrorClassification, ErrorSignals, TransientReason, classify};

/// Retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` means a single attempt.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling applied to every computed delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Self::DEFAULT_MAX_DELAY,
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Delay before retry number `attempt + 1`: `base_delay * 2^attempt`, capped.
///
/// Overflow saturates to the cap.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| policy.base_delay.checked_mul(factor))
        .map_or(policy.max_delay, |delay| delay.min(policy.max_delay))
}

/// Waits out a backoff delay. Swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Receives retry progress. Purely informational.
pub trait RetryObserver: Send + Sync {
    /// A transient failure will be retried after `delay`.
    fn on_retry(&self, attempt: u32, delay: Duration, reason: TransientReason, error: &dyn Error);

    /// The operation succeeded after `attempts` total attempts (> 1).
    fn on_recovered(&self, _attempts: u32) {}

    /// The retry budget ran out.
    fn on_exhausted(&self, _attempts: u32, _error: &dyn Error) {}
}

/// Default observer: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_retry(&self, attempt: u32, delay: Duration, reason: TransientReason, error: &dyn Error) {
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            %reason,
            error = %error,
            "transient failure, retrying after delay"
        );
    }

    fn on_recovered(&self, attempts: u32) {
        info!(attempts, "operation succeeded after retries");
    }

    fn on_exhausted(&self, attempts: u32, error: &dyn Error) {
        warn!(attempts, error = %error, "retry budget exhausted");
    }
}

/// Failure of a retried operation.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Non-transient failure, returned on first occurrence.
    #[error(transparent)]
    Permanent(E),

    /// Every attempt failed transiently; `source` is the last failure.
    #[error("giving up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The cancellation token fired, or the operation reported cancellation.
    #[error("operation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// The underlying operation error, if this failure carries one.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::Permanent(e) | Self::Exhausted { source: e, .. } => Some(e),
            Self::Cancelled { .. } => None,
        }
    }

    /// Transform the wrapped error while keeping the retry outcome.
    pub fn map_source<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Permanent(e) => RetryError::Permanent(f(e)),
            Self::Exhausted { attempts, source } => RetryError::Exhausted {
                attempts,
                source: f(source),
            },
            Self::Cancelled { attempts } => RetryError::Cancelled { attempts },
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl<E: ErrorSignals + 'static> ErrorSignals for RetryError<E> {
    fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Permanent(e) | Self::Exhausted { source: e, .. } => e.is_cancellation(),
        }
    }

    fn status_code(&self) -> Option<u16> {
        self.source_error().and_then(ErrorSignals::status_code)
    }

    fn api_code(&self) -> Option<&str> {
        self.source_error().and_then(ErrorSignals::api_code)
    }

    fn retry_after(&self) -> Option<&str> {
        self.source_error().and_then(ErrorSignals::retry_after)
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn RetryObserver>,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// budget, or `cancel` fires.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: ErrorSignals,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.observer.on_recovered(attempt + 1);
                    }
                    return Ok(value);
                },
                Err(err) => err,
            };

            if err.is_cancellation() {
                return Err(RetryError::Cancelled {
                    attempts: attempt + 1,
                });
            }

            let reason = match classify(&err) {
                ErrorClassification::Permanent => return Err(RetryError::Permanent(err)),
                ErrorClassification::Transient(reason) => reason,
            };

            if attempt >= self.policy.max_attempts {
                self.observer.on_exhausted(attempt + 1, &err);
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            }

            let delay = backoff_delay(&self.policy, attempt);
            self.observer.on_retry(attempt + 1, delay, reason, &err);

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt + 1 });
                },
                () = self.sleeper.sleep(delay) => {},
            }

            attempt += 1;
        }
    }
}

/// [`RetryExecutor::execute`] with the default sleeper and observer.
pub async fn execute<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: ErrorSignals,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryExecutor::new(policy).execute(cancel, operation).await
}
