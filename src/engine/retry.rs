//! Bounded retry with capped exponential backoff. Shared by listing and destination writes.

use log::debug;
use std::thread;
use std::time::Duration;

/// How often and how long to retry a failing call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 means a single attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Cap on cumulative sleep across all retries of one call.
    pub max_total_wait: Option<Duration>,
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_total_wait: None,
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * 2^retry`, capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(exp)
            .min(self.max_backoff)
    }
}

/// What one attempt produced.
pub enum Attempt<T, E> {
    Done(T),
    /// Retryable failure. `after` overrides the computed backoff (e.g. a server retry-after hint).
    Retry {
        error: E,
        after: Option<Duration>,
    },
    /// Permanent failure; do not retry.
    Fail(E),
}

/// Final error of [`with_retry`].
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// True when the retry budget (count or total wait) ran out, false for a permanent failure.
    pub exhausted: bool,
}

/// Run `op` until it returns `Done`/`Fail` or the policy is exhausted.
/// `op` receives the 1-based attempt number.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Attempt<T, E>,
{
    let mut waited = Duration::ZERO;
    let mut retry = 0_u32;
    loop {
        let attempts = retry + 1;
        let (error, after) = match op(attempts) {
            Attempt::Done(v) => return Ok(v),
            Attempt::Fail(error) => {
                return Err(RetryFailure {
                    error,
                    attempts,
                    exhausted: false,
                });
            }
            Attempt::Retry { error, after } => (error, after),
        };
        if retry >= policy.max_retries {
            return Err(RetryFailure {
                error,
                attempts,
                exhausted: true,
            });
        }
        let delay = after.unwrap_or_else(|| policy.backoff(retry));
        if let Some(cap) = policy.max_total_wait
            && waited.saturating_add(delay) > cap
        {
            debug!("{}: total retry wait would exceed {:?}; giving up", label, cap);
            return Err(RetryFailure {
                error,
                attempts,
                exhausted: true,
            });
        }
        debug!("{}: retry {} in {:?}", label, retry + 1, delay);
        thread::sleep(delay);
        waited = waited.saturating_add(delay);
        retry += 1;
    }
}
