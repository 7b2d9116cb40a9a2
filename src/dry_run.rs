//! Records the updates a dry run would have made.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::integrity::PlannedUpdate;

/// Collects planned updates instead of sending them.
///
/// Shared across concurrent update tasks, so the backing list sits
/// behind a mutex.
#[derive(Debug, Default)]
pub struct DryRunRecorder {
    planned: Mutex<Vec<PlannedUpdate>>,
}

impl DryRunRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one update the run would have made.
    pub fn record(&self, issue_id: &str, group_id: &str) {
        self.lock().push(PlannedUpdate::new(issue_id, group_id));
    }

    /// Every update recorded so far, in recording order.
    #[must_use]
    pub fn planned(&self) -> Vec<PlannedUpdate> {
        self.lock().clone()
    }

    /// Number of updates recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Logs every planned update and a closing count.
    pub fn log_summary(&self) {
        let planned = self.planned();
        for update in &planned {
            info!(issue_id = %update.issue_id, group_id = %update.group_id, "would update");
        }
        info!(planned = planned.len(), "dry run complete; no updates were sent");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PlannedUpdate>> {
        self.planned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
