//! Bounded retry with linear backoff.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::traits::RemoteResult;

/// Retry budget and backoff applied to every remote operation.
///
/// After failed attempt `i` (1-based) the policy waits `i × base_delay`
/// before trying again. Only [`RemoteError::is_retryable`] failures are
/// retried; anything else is returned immediately.
///
/// [`RemoteError::is_retryable`]: crate::traits::RemoteError::is_retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the supplied budget and base delay.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Returns the maximum number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Returns the base delay.
    #[must_use]
    pub const fn base_delay(self) -> Duration {
        self.base_delay
    }

    /// Returns the wait applied after failed attempt `attempt`.
    #[must_use]
    pub fn delay_for(self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `call` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the last error observed.
    pub async fn run<T, F, Fut>(self, operation: &'static str, mut call: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts.get() => {
                    let delay = self.delay_for(attempt);
                    warn!(operation, attempt, ?delay, error = %err, "remote call failed; retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(3).expect("non-zero"),
            base_delay: Duration::from_secs(1),
        }
    }
}
