//! Bounded retries with jittered exponential backoff.
//!
//! [`manage_retries`] is the single retry primitive for broker I/O. Each
//! attempt reports whether its failure is worth retrying; retryable failures
//! are retried until `max_attempts` have failed, sleeping for
//! [`jittered_exp_backoff`] between attempts. The sleep observes the supplied
//! cancellation token.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure reported by one attempt of a retried operation.
#[derive(Debug)]
pub enum Failure<E> {
    /// The attempt failed in a way that may succeed if repeated.
    Retry(E),
    /// The attempt failed permanently; no further attempts are made.
    Abort(E),
}

/// Errors returned by [`manage_retries`].
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// An attempt reported a permanent failure.
    #[error(transparent)]
    Aborted(E),

    /// Every permitted attempt failed.
    #[error("failed {attempts} attempt(s) to {description}: {source}")]
    Exhausted {
        /// Human-readable name of the operation.
        description: String,
        /// Number of failed attempts.
        attempts: u8,
        /// Error returned by the last attempt.
        #[source]
        source: E,
    },

    /// Cancellation was requested while waiting to retry.
    #[error("cancelled while retrying attempt to {description}")]
    Cancelled {
        /// Human-readable name of the operation.
        description: String,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns the underlying operation error, if there is one.
    #[must_use]
    pub const fn inner(&self) -> Option<&E> {
        match self {
            Self::Aborted(err) | Self::Exhausted { source: err, .. } => Some(err),
            Self::Cancelled { .. } => None,
        }
    }

    /// Returns `true` when the retry loop ended because of cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Computes the delay before retrying after `failure_count` failures.
///
/// The ceiling is `min(2^failure_count seconds, max_backoff)`; the returned
/// delay lies in `[ceiling / 2, ceiling)`, so it never exceeds `max_backoff`
/// and stops growing once `2^failure_count` passes it.
#[must_use]
pub fn jittered_exp_backoff(failure_count: u32, max_backoff: Duration) -> Duration {
    let ceiling = Duration::from_secs(2_u64.saturating_pow(failure_count)).min(max_backoff);
    let half = ceiling.checked_div(2).unwrap_or_default();
    let half_millis = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
    if half_millis == 0 {
        return half;
    }
    let jitter = rand::rng().random_range(0..half_millis);
    half.saturating_add(Duration::from_millis(jitter))
}

/// Upper bound on the total time [`manage_retries`] sleeps between
/// `max_attempts` attempts.
///
/// Sums the backoff ceilings `min(2^n seconds, max_backoff)` for every
/// failure after which another attempt follows.
#[must_use]
pub fn max_cumulative_backoff(max_attempts: u8, max_backoff: Duration) -> Duration {
    (1..u32::from(max_attempts.max(1)))
        .map(|failures| Duration::from_secs(2_u64.saturating_pow(failures)).min(max_backoff))
        .fold(Duration::ZERO, Duration::saturating_add)
}

/// Runs `operation` until it succeeds, aborts, or exhausts `max_attempts`.
///
/// A `max_attempts` of zero is treated as one.
///
/// # Errors
///
/// Returns [`RetryError::Aborted`] when an attempt reports
/// [`Failure::Abort`], [`RetryError::Exhausted`] after `max_attempts`
/// retryable failures, and [`RetryError::Cancelled`] when `cancel` fires
/// during a backoff sleep.
pub async fn manage_retries<T, E, F, Fut>(
    cancel: &CancellationToken,
    description: &str,
    max_attempts: u8,
    max_backoff: Duration,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure<E>>>,
{
    let attempt_limit = max_attempts.max(1);
    let mut failures: u8 = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(Failure::Abort(err)) => return Err(RetryError::Aborted(err)),
            Err(Failure::Retry(err)) => err,
        };
        failures = failures.saturating_add(1);
        if failures >= attempt_limit {
            return Err(RetryError::Exhausted {
                description: description.to_owned(),
                attempts: failures,
                source: err,
            });
        }
        let delay = jittered_exp_backoff(u32::from(failures), max_backoff);
        debug!(
            operation = description,
            attempt = failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retrying after failure"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {
                return Err(RetryError::Cancelled {
                    description: description.to_owned(),
                });
            }
        }
    }
}
