//! Sliding-window rate limiter for outbound API calls.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Allows at most `max_calls` acquisitions within any `period`-wide window.
///
/// The window lock is held across the wait, so concurrent callers drain
/// through the limiter one at a time instead of stampeding when a slot
/// frees up.
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_calls` per `period`.
    ///
    /// # Panics
    ///
    /// Panics if `max_calls` is zero.
    #[must_use]
    pub fn new(max_calls: usize, period: Duration) -> Self {
        assert!(max_calls > 0, "max_calls must be at least 1");
        Self { max_calls, period, window: Mutex::new(VecDeque::new()) }
    }

    /// Waits until a call slot is available, then claims it.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        loop {
            let now = Instant::now();
            while window.front().is_some_and(|t| now.duration_since(*t) >= self.period) {
                window.pop_front();
            }
            if window.len() < self.max_calls {
                break;
            }
            // Front survived pruning, so it is strictly younger than `period`.
            let wait = self.period - now.duration_since(window[0]);
            debug!(?wait, "rate limit reached; waiting");
            sleep(wait).await;
        }
        window.push_back(Instant::now());
    }
}
