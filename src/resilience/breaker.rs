//! Circuit breaker guarding the API against repeated downstream failures.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Error returned when the breaker rejects a call without attempting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpenError;

impl fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "circuit breaker is open; call rejected")
    }
}

impl std::error::Error for CircuitOpenError {}

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through normally.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// One trial call is allowed through; its outcome decides the next state.
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Instant,
}

/// Opens after `failure_threshold` consecutive failures and rejects calls
/// until `reset_timeout` has passed, then allows a trial call.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// # Panics
    ///
    /// Panics if `failure_threshold` is zero.
    #[must_use]
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        assert!(failure_threshold > 0, "failure_threshold must be at least 1");
        Self {
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: Instant::now(),
            }),
        }
    }

    /// Current state, transitioning open to half-open when the reset
    /// timeout has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        refresh(&mut inner, self.reset_timeout);
        inner.state
    }

    /// Runs `op` through the breaker.
    ///
    /// While open, returns `CircuitOpenError` (converted into `E`) without
    /// invoking `op`. Successes close the breaker and clear the failure
    /// streak; failures count toward the threshold and are passed through
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the rejection error while open, otherwise whatever `op`
    /// returns.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        if !self.try_acquire() {
            return Err(CircuitOpenError.into());
        }
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        refresh(&mut inner, self.reset_timeout);
        inner.state != CircuitState::Open
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("circuit breaker closed after successful trial call");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            if inner.state != CircuitState::Open {
                warn!(
                    failures = inner.consecutive_failures,
                    reset_timeout_secs = self.reset_timeout.as_secs(),
                    "circuit breaker opened"
                );
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Instant::now();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Flips an expired open state to half-open.
fn refresh(inner: &mut BreakerInner, reset_timeout: Duration) {
    if inner.state == CircuitState::Open && inner.opened_at.elapsed() >= reset_timeout {
        inner.state = CircuitState::HalfOpen;
    }
}

#[cfg(test)]
mod tests {
    use super::{CircuitBreaker, CircuitOpenError, CircuitState};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Boom,
        Rejected,
    }

    impl From<CircuitOpenError> for TestError {
        fn from(_: CircuitOpenError) -> Self {
            Self::Rejected
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(2, Duration::from_secs(60))
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        assert_eq!(result.unwrap_err(), TestError::Boom);
    }

    #[tokio::test(start_paused = true)]
    async fn opens_at_the_failure_threshold() {
        let breaker = breaker();

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_rejects_without_invoking_the_operation() {
        let breaker = breaker();
        fail(&breaker).await;
        fail(&breaker).await;

        let mut invoked = false;
        let result: Result<(), TestError> = breaker
            .call(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), TestError::Rejected);
        assert!(!invoked);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_trial_call_closes_the_breaker() {
        let breaker = breaker();
        fail(&breaker).await;
        fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let result: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);

        // The streak restarts from zero after the trial success.
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_call_reopens_the_breaker() {
        let breaker = breaker();
        fail(&breaker).await;
        fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(60)).await;
        fail(&breaker).await;

        assert_eq!(breaker.state(), CircuitState::Open);
        let result: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;
        assert_eq!(result.unwrap_err(), TestError::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn success_in_closed_state_clears_the_streak() {
        let breaker = breaker();

        fail(&breaker).await;
        let result: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        fail(&breaker).await;

        // Two failures total, but never two in a row.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
