use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::notifetch::pipeline::error::Result;

/// Bounded backoff settings for page requests.
///
/// Transient failures and rate-limit signals are budgeted separately: a
/// throttled request waits for as long as the service asks and does not use
/// up the transient budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request when failures are transient.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// How many rate-limit pauses a single request may take.
    pub rate_limit_max_attempts: u32,
    /// Pause used when a rate-limit response names no delay.
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            rate_limit_max_attempts: 10,
            rate_limit_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the `failures`-th transient failure:
    /// `base * 2^(failures - 1)`, capped at `max_delay_ms`.
    pub fn transient_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Runs `op` until it succeeds, fails fatally, or exhausts its budget.
    /// The last error is returned when the budget runs out.
    pub fn run<T>(
        &self,
        sleeper: &dyn Sleeper,
        label: &str,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let mut transient_failures = 0u32;
        let mut rate_limited = 0u32;

        loop {
            let error = match op() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if let Some(hint) = error.rate_limit_delay() {
                rate_limited += 1;
                if rate_limited > self.rate_limit_max_attempts {
                    return Err(error);
                }
                let delay = hint.unwrap_or_else(|| self.rate_limit_delay());
                warn!(label, attempt = rate_limited, delay_ms = delay.as_millis() as u64, "rate limited; pausing");
                sleeper.sleep(delay);
            } else if error.is_retryable() {
                transient_failures += 1;
                if transient_failures >= self.max_attempts {
                    return Err(error);
                }
                let delay = self.transient_delay(transient_failures);
                warn!(label, attempt = transient_failures, delay_ms = delay.as_millis() as u64, %error, "transient failure; retrying");
                sleeper.sleep(delay);
            } else {
                return Err(error);
            }
        }
    }
}

/// Blocks the current fetch for a while. Swapped out in tests.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
