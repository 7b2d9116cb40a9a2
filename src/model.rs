//! Core domain types shared across the backfill pipeline.

use std::fmt;

/// An issue record read from a data source.
///
/// Records selected for processing are missing their creator group; the
/// pipeline's job is to resolve and attach one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Platform identifier of the issue (e.g. `"ISS-123"`).
    pub issue_id: String,
    /// Identifier of the user who created the issue.
    pub creator_user_id: String,
    /// Name of the group the issue is assigned to, possibly empty.
    pub assigned_group: String,
    /// The creator's group, when already known. `None` for records that
    /// need the backfill.
    pub creator_group: Option<String>,
}

/// A user's primary group association resolved through the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroup {
    /// The user this association belongs to.
    pub user_id: String,
    /// Identifier of the user's primary group.
    pub group_id: String,
    /// Display name of the group, when the API provides one.
    pub group_name: Option<String>,
}

/// Aggregated counters for a backfill run.
///
/// `total_processed` counts every record seen, including skipped ones;
/// the success rate is computed over attempted updates only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Records seen by the run.
    pub total_processed: usize,
    /// Updates confirmed by the platform (or recorded during a dry run).
    pub successful_updates: usize,
    /// Updates that were attempted and did not apply.
    pub failed_updates: usize,
    /// Records skipped before any update was attempted.
    pub skipped_updates: usize,
}

impl ProcessingResult {
    /// Creates an empty result with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a confirmed update.
    pub fn record_success(&mut self) {
        self.total_processed += 1;
        self.successful_updates += 1;
    }

    /// Records an update that was attempted and failed.
    pub fn record_failure(&mut self) {
        self.total_processed += 1;
        self.failed_updates += 1;
    }

    /// Records a record that was skipped without an update attempt.
    pub fn record_skipped(&mut self) {
        self.total_processed += 1;
        self.skipped_updates += 1;
    }

    /// Percentage of attempted updates that succeeded.
    ///
    /// A run with no attempted updates reports 0%.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful_updates + self.failed_updates;
        self.successful_updates as f64 / attempted.max(1) as f64 * 100.0
    }
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Backfill complete:")?;
        writeln!(f, "  total processed:    {}", self.total_processed)?;
        writeln!(f, "  successful updates: {}", self.successful_updates)?;
        writeln!(f, "  failed updates:     {}", self.failed_updates)?;
        writeln!(f, "  skipped:            {}", self.skipped_updates)?;
        write!(f, "  success rate:       {:.1}%", self.success_rate())
    }
}
