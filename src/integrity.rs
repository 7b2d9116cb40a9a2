//! Post-run verification that intended updates were actually applied.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// An update the run intended (or reported) for one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// The issue the update targets.
    pub issue_id: String,
    /// The creator group the issue should end up with.
    pub group_id: String,
}

impl PlannedUpdate {
    /// Convenience constructor.
    #[must_use]
    pub fn new(issue_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self { issue_id: issue_id.into(), group_id: group_id.into() }
    }
}

/// A single discrepancy between intended and applied updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The run intended this update but never reported applying it.
    NotApplied {
        /// The affected issue.
        issue_id: String,
        /// The group that should have been set.
        group_id: String,
    },
    /// The issue was updated with a different group than intended.
    WrongGroup {
        /// The affected issue.
        issue_id: String,
        /// The group the run intended.
        expected: String,
        /// The group that was reported applied.
        actual: String,
    },
    /// An update was reported for an issue the run never planned.
    Unexpected {
        /// The affected issue.
        issue_id: String,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplied { issue_id, group_id } => {
                write!(f, "{issue_id}: intended group {group_id} was not applied")
            }
            Self::WrongGroup { issue_id, expected, actual } => {
                write!(f, "{issue_id}: expected group {expected}, applied {actual}")
            }
            Self::Unexpected { issue_id } => {
                write!(f, "{issue_id}: update applied but never planned")
            }
        }
    }
}

/// Outcome of comparing intended updates against applied ones.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// How many intended updates were checked.
    pub checked: usize,
    /// Every discrepancy found, in intended-update order.
    pub mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    /// `true` when every intended update was applied as planned.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compares the updates a run intended with the ones it reported
/// applying.
#[must_use]
pub fn verify_updates(intended: &[PlannedUpdate], applied: &[PlannedUpdate]) -> IntegrityReport {
    let applied_by_issue: HashMap<&str, &str> = applied
        .iter()
        .map(|update| (update.issue_id.as_str(), update.group_id.as_str()))
        .collect();

    let mut mismatches = Vec::new();
    for update in intended {
        match applied_by_issue.get(update.issue_id.as_str()) {
            None => mismatches.push(Mismatch::NotApplied {
                issue_id: update.issue_id.clone(),
                group_id: update.group_id.clone(),
            }),
            Some(actual) if *actual != update.group_id => mismatches.push(Mismatch::WrongGroup {
                issue_id: update.issue_id.clone(),
                expected: update.group_id.clone(),
                actual: (*actual).to_string(),
            }),
            Some(_) => {}
        }
    }

    let intended_ids: HashSet<&str> =
        intended.iter().map(|update| update.issue_id.as_str()).collect();
    for update in applied {
        if !intended_ids.contains(update.issue_id.as_str()) {
            mismatches.push(Mismatch::Unexpected { issue_id: update.issue_id.clone() });
        }
    }

    IntegrityReport { checked: intended.len(), mismatches }
}
