//! DevRev API client composing caching, retry, circuit breaking, and
//! rate limiting around the gateway port.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::cache::Cache;
use crate::config::Config;
use crate::model::UserGroup;
use crate::ports::gateway::TicketGateway;
use crate::resilience::{CircuitBreaker, RateLimiter, RetryPolicy};

/// Backoff multiplier between retry attempts.
const RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// High-level client for the two domain operations the backfill needs.
///
/// Every network call runs as retry(breaker(limiter(gateway))): the
/// limiter throttles each attempt, the breaker counts each attempt, and
/// the retry policy re-runs only errors marked retryable.
pub struct ApiClient {
    gateway: Box<dyn TicketGateway>,
    cache: Cache<HashMap<String, UserGroup>>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Creates a client wired with the configured resilience settings.
    #[must_use]
    pub fn new(gateway: Box<dyn TicketGateway>, config: &Config) -> Self {
        Self {
            gateway,
            cache: Cache::new(config.cache_ttl),
            limiter: RateLimiter::new(config.rate_limit_calls, config.rate_limit_period),
            breaker: CircuitBreaker::new(
                config.circuit_failure_threshold,
                config.circuit_reset_timeout,
            ),
            retry: RetryPolicy::new(config.max_retries, config.retry_delay, RETRY_BACKOFF_FACTOR),
        }
    }

    /// Resolves each user's primary group, returning a map keyed by user
    /// id. Users with no group association are omitted (and logged).
    ///
    /// Results are cached under the sorted, deduplicated id set, so a
    /// repeat call within the TTL makes no network request.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from the lookup call after retries are
    /// exhausted.
    pub async fn resolve_groups(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, UserGroup>, ApiError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids = user_ids.to_vec();
        ids.sort();
        ids.dedup();
        let cache_key = ids.join(",");

        if let Some(groups) = self.cache.get(&cache_key) {
            debug!(users = ids.len(), "group lookup served from cache");
            return Ok(groups);
        }

        let groups = self
            .retry
            .run(
                || {
                    self.breaker.call(|| async {
                        self.limiter.acquire().await;
                        self.gateway.list_user_groups(&ids).await
                    })
                },
                ApiError::is_retryable,
            )
            .await?;

        let by_user: HashMap<String, UserGroup> =
            groups.into_iter().map(|group| (group.user_id.clone(), group)).collect();
        for id in &ids {
            if !by_user.contains_key(id) {
                warn!(user_id = %id, "no group association found for user");
            }
        }

        self.cache.set(cache_key, by_user.clone());
        Ok(by_user)
    }

    /// Applies one creator group update.
    ///
    /// Returns `Ok(true)` when the platform confirmed the update (or the
    /// call was skipped for a dry run), `Ok(false)` when the platform
    /// rejected this particular record (missing or forbidden).
    ///
    /// # Errors
    ///
    /// Returns any other [`ApiError`]; `Auth` errors are fatal to the
    /// run.
    pub async fn update_creator_group(
        &self,
        issue_id: &str,
        group_id: &str,
        dry_run: bool,
    ) -> Result<bool, ApiError> {
        if dry_run {
            info!(issue_id, group_id, "dry run: would update creator group");
            return Ok(true);
        }

        let result = self
            .retry
            .run(
                || {
                    self.breaker.call(|| async {
                        self.limiter.acquire().await;
                        self.gateway.update_creator_group(issue_id, group_id).await
                    })
                },
                ApiError::is_retryable,
            )
            .await;

        match result {
            Ok(()) => {
                debug!(issue_id, group_id, "creator group updated");
                Ok(true)
            }
            Err(ApiError::NotFound(msg)) => {
                warn!(issue_id, reason = %msg, "issue not found; update not applied");
                Ok(false)
            }
            Err(ApiError::Forbidden(msg)) => {
                warn!(issue_id, reason = %msg, "permission denied; update not applied");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Confirms the API credential works before processing starts.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`ApiError`] unchanged.
    pub async fn verify_connection(&self) -> Result<(), ApiError> {
        self.limiter.acquire().await;
        self.gateway.verify_auth().await
    }
}
