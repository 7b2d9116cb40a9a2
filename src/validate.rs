//! Record validation run before any update is attempted.
//!
//! Validation never fails the run by itself: hard errors make the record
//! ineligible for an update (it is skipped and counted), warnings are
//! logged and processing continues.

use crate::model::Issue;

/// Outcome of validating a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that make the record ineligible for an update.
    pub errors: Vec<String>,
    /// Oddities worth logging that do not block the update.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// `true` when the record can proceed to an update.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks the fields an update requires.
///
/// A missing issue id or creator id is an error; a missing assigned
/// group is only a warning since the update does not touch it.
#[must_use]
pub fn validate_issue(issue: &Issue) -> ValidationReport {
    let mut report = ValidationReport::default();
    if issue.issue_id.trim().is_empty() {
        report.errors.push("Issue ID is required".to_string());
    }
    if issue.creator_user_id.trim().is_empty() {
        report.errors.push("Creator user ID is required".to_string());
    }
    if issue.assigned_group.trim().is_empty() {
        report.warnings.push("Issue has no assigned group".to_string());
    }
    report
}
