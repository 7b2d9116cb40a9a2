//! Checkpoint persistence for resumable runs.
//!
//! A checkpoint is one small JSON file overwritten after every batch.
//! Loading is forgiving: a missing or unreadable file simply means the
//! run starts from the beginning.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Progress snapshot written after each batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// 1-based number of the batch that just finished.
    pub batch_num: usize,
    /// Records handled so far across the whole run, counted from the
    /// start of the source's record order.
    pub items_processed: usize,
    /// Issue ids updated in the batch that just finished.
    pub results: Vec<String>,
}

impl Checkpoint {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn new(batch_num: usize, items_processed: usize, results: Vec<String>) -> Self {
        Self { timestamp: Utc::now(), batch_num, items_processed, results }
    }
}

/// Reads and writes the checkpoint file.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes `checkpoint`, replacing any previous snapshot wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error string when serialization or the write fails.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), String> {
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| format!("failed to serialize checkpoint: {e}"))?;
        fs::write(&self.path, json)
            .map_err(|e| format!("failed to write checkpoint {}: {e}", self.path.display()))
    }

    /// Reads the latest snapshot. A missing file returns `None`; a
    /// corrupt one is logged and also returns `None`.
    #[must_use]
    pub fn load(&self) -> Option<Checkpoint> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt checkpoint file");
                None
            }
        }
    }
}
