//! Bounded retry with a fixed backoff schedule.
//!
//! Wraps a single async operation and re-invokes it on failure. The policy
//! carries no state across calls; each `run` starts a fresh attempt counter,
//! so one policy value can drive any number of concurrent operations.
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Attempt limit plus the wait schedule used between attempts.
///
/// The schedule is indexed by the zero-based number of the attempt that just
/// failed; a schedule shorter than `max_attempts - 1` reuses its last entry
/// for the remaining waits.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_for(&self, failed_attempt: u32) -> Duration {
        self.backoff
            .get(failed_attempt as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Run `op` until it succeeds or `max_attempts` attempts have failed.
    ///
    /// Returns the first success immediately, with no further attempts and
    /// no delay. After the final attempt fails, the last error is returned
    /// unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempts = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempts - 1);
                    warn!(%err, attempt = attempts, delay_ms = delay.as_millis() as u64, "attempt failed; backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
