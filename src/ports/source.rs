//! Issue source port for reading backfill candidates.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::model::Issue;

/// A failed interaction with a record source.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be reached or opened.
    Connection(String),
    /// The source rejected or failed the candidate query.
    Query(String),
    /// The source answered with data the adapter could not interpret.
    Parse(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "source connection failed: {msg}"),
            Self::Query(msg) => write!(f, "source query failed: {msg}"),
            Self::Parse(msg) => write!(f, "source data invalid: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Boxed future type alias used by [`IssueSource`] to keep the trait
/// dyn-compatible.
pub type SourceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Supplies the issue records that need a creator group backfill.
pub trait IssueSource: Send + Sync {
    /// Short name used in logs and status output (e.g. `"csv"`).
    fn name(&self) -> &'static str;

    /// Reads every record whose creator group is missing.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the source cannot be read.
    fn issues_missing_creator_group(&self) -> SourceFuture<'_, Vec<Issue>>;

    /// Cheap health check run before processing starts.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the source is unusable.
    fn test_connection(&self) -> SourceFuture<'_, ()>;
}
