//! Retry with exponential backoff and jitter.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Ceiling applied to any single backoff delay.
const MAX_DELAY_SECS: f64 = 60.0;

/// Additive jitter span as a fraction of the base delay.
const JITTER_SPAN: f64 = 0.1;

/// Retries eligible failures with exponentially growing delays.
///
/// The delay before retry `n` (0-indexed) is
/// `base_delay * backoff_factor^n` plus a small jitter drawn from
/// `[0, 0.1 * base_delay)`, capped at one minute.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Creates a policy making up to `max_attempts` calls in total.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        assert!(max_attempts > 0, "max_attempts must be at least 1");
        Self { max_attempts, base_delay, backoff_factor }
    }

    /// Runs `op`, retrying while `is_eligible` accepts the error and
    /// attempts remain.
    ///
    /// Ineligible errors and the final attempt's error are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_eligible: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_eligible(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %err,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let backoff = base * self.backoff_factor.powf(f64::from(attempt.min(32)));
        let jitter = jitter_fraction(attempt) * JITTER_SPAN * base;
        Duration::from_secs_f64((backoff + jitter).min(MAX_DELAY_SECS))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

/// Pseudo-random fraction in `[0, 1)` hashed from the clock and attempt
/// number, spreading retries without pulling in an RNG.
#[allow(clippy::cast_precision_loss)]
fn jitter_fraction(attempt: u32) -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u64::from(d.subsec_nanos()));
    let hash = nanos.wrapping_mul(31).wrapping_add(u64::from(attempt).wrapping_mul(17));
    (hash % 1000) as f64 / 1000.0
}
