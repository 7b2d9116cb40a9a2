//! Resilience primitives wrapped around outbound API calls.
//!
//! The API client composes these explicitly: retry on the outside, then
//! the circuit breaker, then the rate limiter directly around the network
//! call, so retried attempts are throttled and counted like first
//! attempts.

pub mod breaker;
pub mod rate_limit;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitOpenError, CircuitState};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
