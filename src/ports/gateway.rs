//! Ticket gateway port for the DevRev API.

use std::future::Future;
use std::pin::Pin;

use crate::api::error::ApiError;
use crate::model::UserGroup;

/// Boxed future type alias used by [`TicketGateway`] to keep the trait
/// dyn-compatible.
pub type GatewayFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Raw operations against the ticket platform.
///
/// Implementations perform single calls with no retry or throttling;
/// the API client layers those on top.
pub trait TicketGateway: Send + Sync {
    /// Fetches the primary group association for each of the given users.
    ///
    /// Users that exist but have no group are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] categorizing the HTTP failure.
    fn list_user_groups(&self, user_ids: &[String]) -> GatewayFuture<'_, Vec<UserGroup>>;

    /// Sets the creator group of one issue.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] categorizing the HTTP failure.
    fn update_creator_group(&self, issue_id: &str, group_id: &str) -> GatewayFuture<'_, ()>;

    /// Confirms the configured credential is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] for a rejected credential, or another
    /// [`ApiError`] for transport problems.
    fn verify_auth(&self) -> GatewayFuture<'_, ()>;
}
