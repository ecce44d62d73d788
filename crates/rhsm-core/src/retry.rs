//! Retry controls for recoverable subscription-manager operations.
//!
//! Only operations that can succeed on a later attempt (release set/unset,
//! refresh) are wrapped. A [`TerminalError`] from the operation counts as a
//! failed attempt; after the last attempt the error is returned unchanged.
//! The wait between attempts blocks the calling thread.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TerminalError;
use crate::Result;

/// Attempt count and fixed delay for one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least 1)
    pub max_attempts: u32,
    /// Seconds to wait between attempts (0 = retry immediately)
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 5,
        }
    }
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_secs,
        }
    }

    /// Delay between attempts, `None` when retrying immediately
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_secs > 0).then(|| Duration::from_secs(self.delay_secs))
    }
}

/// Blocking wait between attempts.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Invoke `op` until it succeeds or `policy.max_attempts` attempts failed.
///
/// `operation` names the underlying action in log lines.
pub fn retry<T, F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err: TerminalError = match op() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            warn!(
                attempt,
                max_attempts,
                operation,
                "Attempt {} of {} to perform {} failed. Maximum number of retries has been reached.",
                attempt,
                max_attempts,
                operation
            );
            return Err(err);
        }

        match policy.delay() {
            Some(delay) => {
                info!(
                    attempt,
                    max_attempts,
                    operation,
                    "Attempt {} of {} to perform {} failed - Retrying after {} seconds",
                    attempt,
                    max_attempts,
                    operation,
                    delay.as_secs()
                );
                sleeper.sleep(delay);
            }
            None => {
                info!(
                    attempt,
                    max_attempts,
                    operation,
                    "Attempt {} of {} to perform {} failed - Retrying...",
                    attempt,
                    max_attempts,
                    operation
                );
            }
        }
    }
}
