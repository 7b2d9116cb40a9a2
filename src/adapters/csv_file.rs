//! CSV-backed implementation of the `IssueSource` port.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::model::Issue;
use crate::ports::source::{IssueSource, SourceError, SourceFuture};

/// Header columns an input file must carry.
const REQUIRED_COLUMNS: [&str; 2] = ["issue_id", "creator_user_id"];

/// Reads backfill candidates from a CSV file with the columns
/// `issue_id, creator_user_id, assigned_group, creator_group`.
pub struct CsvSource {
    path: PathBuf,
}

/// One row as it appears in the input file.
#[derive(Debug, Deserialize)]
struct CsvRow {
    issue_id: String,
    creator_user_id: String,
    #[serde(default)]
    assigned_group: String,
    #[serde(default)]
    creator_group: String,
}

impl CsvSource {
    /// Creates a source reading from the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_candidates(&self) -> Result<Vec<Issue>, SourceError> {
        let mut reader = open_reader(&self.path)?;
        let mut candidates = Vec::new();
        for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
            // Line 1 is the header.
            let line = index + 2;
            match row {
                Ok(row) => {
                    if let Some(issue) = candidate_from_row(row) {
                        candidates.push(issue);
                    }
                }
                Err(e) => warn!(line, error = %e, "skipping malformed CSV row"),
            }
        }
        Ok(candidates)
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SourceError> {
    csv::Reader::from_path(path)
        .map_err(|e| SourceError::Connection(format!("failed to open {}: {e}", path.display())))
}

/// Whether a creator group value counts as absent. Warehouse exports
/// commonly render SQL NULLs as the literal strings `null` or `none`.
fn missing_group(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("none")
}

/// Turns a row into a backfill candidate, or `None` when the row already
/// has a creator group. Required-field problems are left for validation
/// so they show up in the run counters.
fn candidate_from_row(row: CsvRow) -> Option<Issue> {
    if !missing_group(&row.creator_group) {
        return None;
    }
    Some(Issue {
        issue_id: row.issue_id.trim().to_string(),
        creator_user_id: row.creator_user_id.trim().to_string(),
        assigned_group: row.assigned_group.trim().to_string(),
        creator_group: None,
    })
}

impl IssueSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn issues_missing_creator_group(&self) -> SourceFuture<'_, Vec<Issue>> {
        Box::pin(async move { self.read_candidates() })
    }

    fn test_connection(&self) -> SourceFuture<'_, ()> {
        Box::pin(async move {
            let mut reader = open_reader(&self.path)?;
            let headers = reader
                .headers()
                .map_err(|e| SourceError::Parse(format!("failed to read CSV headers: {e}")))?;
            for required in REQUIRED_COLUMNS {
                if !headers.iter().any(|header| header.trim() == required) {
                    return Err(SourceError::Parse(format!(
                        "CSV header is missing required column {required}"
                    )));
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CsvSource;
    use crate::ports::source::{IssueSource, SourceError};
    use std::path::PathBuf;

    struct TempCsv {
        path: PathBuf,
    }

    impl TempCsv {
        fn new(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!("regroup_csv_{}_{name}.csv", std::process::id()));
            std::fs::write(&path, contents).unwrap();
            Self { path }
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[tokio::test]
    async fn only_rows_without_a_creator_group_are_candidates() {
        let file = TempCsv::new(
            "filtering",
            "issue_id,creator_user_id,assigned_group,creator_group\n\
             ISS-1,USR-1,platform,\n\
             ISS-2,USR-2,platform,GRP-EXISTING\n\
             ISS-3,USR-3,support,null\n\
             ISS-4,USR-4,support,NONE\n\
             ISS-5,USR-5,support,GRP-OTHER\n",
        );
        let source = CsvSource::new(&file.path);

        let issues = source.issues_missing_creator_group().await.unwrap();

        let ids: Vec<&str> = issues.iter().map(|i| i.issue_id.as_str()).collect();
        assert_eq!(ids, vec!["ISS-1", "ISS-3", "ISS-4"]);
        assert!(issues.iter().all(|i| i.creator_group.is_none()));
    }

    #[tokio::test]
    async fn fields_are_trimmed() {
        let file = TempCsv::new(
            "trimming",
            "issue_id,creator_user_id,assigned_group,creator_group\n\
             \" ISS-1 \",\" USR-1 \",\" platform \",\n",
        );
        let source = CsvSource::new(&file.path);

        let issues = source.issues_missing_creator_group().await.unwrap();

        assert_eq!(issues[0].issue_id, "ISS-1");
        assert_eq!(issues[0].creator_user_id, "USR-1");
        assert_eq!(issues[0].assigned_group, "platform");
    }

    #[tokio::test]
    async fn rows_with_empty_required_fields_still_flow_through() {
        // Validation, not the source, decides what to do with these.
        let file = TempCsv::new(
            "incomplete",
            "issue_id,creator_user_id,assigned_group,creator_group\n\
             ,USR-1,platform,\n",
        );
        let source = CsvSource::new(&file.path);

        let issues = source.issues_missing_creator_group().await.unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].issue_id.is_empty());
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let file = TempCsv::new(
            "malformed",
            "issue_id,creator_user_id,assigned_group,creator_group\n\
             ISS-1,USR-1,platform,\n\
             ISS-2,USR-2\n\
             ISS-3,USR-3,support,\n",
        );
        let source = CsvSource::new(&file.path);

        let issues = source.issues_missing_creator_group().await.unwrap();

        let ids: Vec<&str> = issues.iter().map(|i| i.issue_id.as_str()).collect();
        assert_eq!(ids, vec!["ISS-1", "ISS-3"]);
    }

    #[tokio::test]
    async fn connection_test_rejects_a_missing_file() {
        let source = CsvSource::new("/definitely/not/here.csv");
        let err = source.test_connection().await.unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
    }

    #[tokio::test]
    async fn connection_test_rejects_missing_columns() {
        let file = TempCsv::new("headers", "issue_id,owner\nISS-1,USR-1\n");
        let source = CsvSource::new(&file.path);

        let err = source.test_connection().await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(msg) if msg.contains("creator_user_id")));
    }

    #[tokio::test]
    async fn connection_test_accepts_a_file_with_only_headers() {
        let file =
            TempCsv::new("empty", "issue_id,creator_user_id,assigned_group,creator_group\n");
        let source = CsvSource::new(&file.path);

        source.test_connection().await.unwrap();
        let issues = source.issues_missing_creator_group().await.unwrap();
        assert!(issues.is_empty());
    }
}
