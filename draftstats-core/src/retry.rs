//! Bounded retry with exponential backoff for blocking network calls
//!
//! Only [`TransientIo`](crate::domain::result::Error::TransientIo) is retried. Everything else is returned on the
//! first attempt, and the last transient error is returned once the attempt
//! budget runs out.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::domain::result::Result;

/// Retry behaviour for one backend
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote()
    }
}

impl RetryPolicy {
    /// Remote analytics API: 3 attempts, 200ms doubling up to 2s
    #[must_use]
    pub fn remote() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Distributed store: quicker first retry, reconnect is cheap
    #[must_use]
    pub fn distributed() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }

    /// Near-zero delays for tests
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before the retry that follows `attempt` (1-based), before jitter
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_nanos() as f64 * self.factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.round() as u64)
    }
}

/// Up to 10% extra so concurrent callers do not retry in lockstep
fn with_jitter(delay: Duration) -> Duration {
    let spread = (delay.as_millis() / 10) as u64;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// Run `operation`, retrying transient failures according to `policy`
pub fn retry_transient<T, F>(operation_name: &str, policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    info!("'{}' succeeded after {} attempts", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = with_jitter(policy.delay_after(attempt));
                warn!(
                    "'{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name, attempt, max_attempts, err, delay
                );
                thread::sleep(delay);
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(
                        "'{}' giving up after {} attempts: {}",
                        operation_name, attempt, err
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::Error;
    use std::cell::Cell;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::remote();
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
        assert_eq!(policy.delay_after(3), Duration::from_millis(800));
        assert_eq!(policy.delay_after(10), Duration::from_secs(2));
    }

    #[test]
    fn test_transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = retry_transient("flaky", &RetryPolicy::immediate(3), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::transient("connection refused"))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_attempt_budget_is_bounded() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_transient("down", &RetryPolicy::immediate(4), || {
            calls.set(calls.get() + 1);
            Err(Error::transient("timed out"))
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_transient("bad", &RetryPolicy::immediate(5), || {
            calls.set(calls.get() + 1);
            Err(Error::http("HTTP 500"))
        });
        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let _ = retry_transient("once", &RetryPolicy::immediate(0), || {
            calls.set(calls.get() + 1);
            Err::<(), _>(Error::transient("timed out"))
        });
        assert_eq!(calls.get(), 1);
    }
}
