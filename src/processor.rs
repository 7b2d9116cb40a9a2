//! The backfill pipeline: validate records, resolve creator groups,
//! and drive batched, concurrency-gated update calls.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::batch::BatchProcessor;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::dry_run::DryRunRecorder;
use crate::integrity::{verify_updates, IntegrityReport, PlannedUpdate};
use crate::model::{Issue, ProcessingResult, UserGroup};
use crate::validate::validate_issue;

/// What to do with a record whose creator has no resolved group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingGroupPolicy {
    /// Skip the record; it counts toward the total but not as a failure.
    #[default]
    Skip,
    /// Count the record as a failed update.
    Fail,
}

/// Per-record outcome inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The update was applied (or would be, in a dry run).
    Updated {
        /// The updated issue.
        issue_id: String,
        /// The group that was set.
        group_id: String,
    },
    /// The update was attempted and did not apply.
    Failed {
        /// The affected issue.
        issue_id: String,
    },
    /// The record was skipped before any update attempt.
    Skipped {
        /// The skipped issue.
        issue_id: String,
    },
}

/// Knobs controlling one backfill run.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Record planned updates without sending them.
    pub dry_run: bool,
    /// Policy for creators without a resolved group.
    pub missing_group: MissingGroupPolicy,
    /// Compare intended and applied updates after the run.
    pub verify: bool,
    /// Maximum in-flight update calls per batch. Must be at least 1.
    pub concurrency: usize,
    /// Batches already completed by a previous run.
    pub resume_batches: usize,
    /// Records already handled by a previous run.
    pub resume_items: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            missing_group: MissingGroupPolicy::Skip,
            verify: false,
            concurrency: 10,
            resume_batches: 0,
            resume_items: 0,
        }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Aggregated per-record counters.
    pub result: ProcessingResult,
    /// The abort reason when consecutive batch failures stopped the run.
    pub aborted: Option<String>,
    /// Integrity comparison, present when verification was requested.
    pub integrity: Option<IntegrityReport>,
}

impl RunReport {
    /// `true` when the run finished with zero failed updates.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.failed_updates == 0 && self.aborted.is_none()
    }
}

/// Drives records from a source through validation, group resolution,
/// and batched updates.
pub struct BackfillProcessor<'a> {
    client: &'a ApiClient,
    batch: BatchProcessor,
    options: ProcessorOptions,
    checkpoints: Option<&'a CheckpointStore>,
    recorder: Option<&'a DryRunRecorder>,
}

impl<'a> BackfillProcessor<'a> {
    /// Creates a processor over the given client and batch settings.
    ///
    /// # Panics
    ///
    /// Panics if `options.concurrency` is zero.
    #[must_use]
    pub fn new(client: &'a ApiClient, batch: BatchProcessor, options: ProcessorOptions) -> Self {
        assert!(options.concurrency > 0, "concurrency must be at least 1");
        Self { client, batch, options, checkpoints: None, recorder: None }
    }

    /// Saves a checkpoint after every completed batch.
    #[must_use]
    pub fn with_checkpoints(mut self, store: &'a CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Records planned updates during dry runs.
    #[must_use]
    pub fn with_recorder(mut self, recorder: &'a DryRunRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Runs the whole pipeline over `records`.
    ///
    /// Creator groups are resolved once up front; each batch then
    /// validates its records, issues gated concurrent updates, and
    /// saves a checkpoint when a store is attached.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] from the up-front group resolution.
    /// Per-record update errors never surface here; they are folded
    /// into the report's counters.
    pub async fn run(&self, records: &[Issue]) -> Result<RunReport, ApiError> {
        let remaining: &[Issue] = if self.options.resume_batches > 0 {
            let skip = self.options.resume_batches.saturating_mul(self.batch.batch_size());
            if skip >= records.len() {
                info!("checkpoint already covers every candidate record; nothing to do");
                return Ok(RunReport {
                    result: ProcessingResult::new(),
                    aborted: None,
                    integrity: None,
                });
            }
            info!(
                batches = self.options.resume_batches,
                records = skip,
                "resuming after checkpoint"
            );
            &records[skip..]
        } else {
            records
        };

        let creator_ids: Vec<String> = remaining
            .iter()
            .filter(|record| !record.creator_user_id.trim().is_empty())
            .map(|record| record.creator_user_id.clone())
            .collect();
        let groups = self.client.resolve_groups(&creator_ids).await?;
        info!(records = remaining.len(), creators = groups.len(), "resolved creator groups");

        let processed = Cell::new(self.options.resume_items);
        let intended = RefCell::new(Vec::new());

        let report = self
            .batch
            .process(remaining, |batch_num, batch| {
                self.run_batch(batch_num, batch, &groups, &processed, &intended)
            })
            .await;

        let mut result = ProcessingResult::new();
        let mut applied = Vec::new();
        for outcome in &report.outcomes {
            if outcome.succeeded {
                for item in &outcome.output {
                    match item {
                        ItemOutcome::Updated { issue_id, group_id } => {
                            result.record_success();
                            applied.push(PlannedUpdate::new(issue_id.as_str(), group_id.as_str()));
                        }
                        ItemOutcome::Failed { .. } => result.record_failure(),
                        ItemOutcome::Skipped { .. } => result.record_skipped(),
                    }
                }
            } else {
                for _ in &outcome.input {
                    result.record_failure();
                }
            }
        }

        let aborted = if report.aborted {
            let reason = report
                .last_error()
                .map_or_else(|| "too many consecutive batch failures".to_string(), ToString::to_string);
            error!(error = %reason, "run aborted");
            Some(reason)
        } else {
            None
        };

        let integrity = if self.options.verify {
            let intended = intended.into_inner();
            let integrity_report = verify_updates(&intended, &applied);
            if integrity_report.is_clean() {
                info!(checked = integrity_report.checked, "integrity check passed");
            } else {
                for mismatch in &integrity_report.mismatches {
                    warn!(%mismatch, "integrity mismatch");
                }
            }
            Some(integrity_report)
        } else {
            None
        };

        Ok(RunReport { result, aborted, integrity })
    }

    /// Validates each record and decides its fate: an update to send, or
    /// an immediate skip/failure outcome.
    fn plan_batch(
        &self,
        batch: &[Issue],
        groups: &HashMap<String, UserGroup>,
        intended: &RefCell<Vec<PlannedUpdate>>,
    ) -> (Vec<ItemOutcome>, Vec<(String, String)>) {
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut updates: Vec<(String, String)> = Vec::new();

        for record in batch {
            let validation = validate_issue(record);
            for warning in &validation.warnings {
                warn!(issue_id = %record.issue_id, %warning, "validation warning");
            }
            if !validation.is_valid() {
                for error in &validation.errors {
                    warn!(issue_id = %record.issue_id, %error, "skipping invalid record");
                }
                outcomes.push(ItemOutcome::Skipped { issue_id: record.issue_id.clone() });
                continue;
            }

            match groups.get(&record.creator_user_id) {
                Some(group) => {
                    intended
                        .borrow_mut()
                        .push(PlannedUpdate::new(record.issue_id.as_str(), group.group_id.as_str()));
                    if self.options.dry_run {
                        if let Some(recorder) = self.recorder {
                            recorder.record(&record.issue_id, &group.group_id);
                        }
                    }
                    updates.push((record.issue_id.clone(), group.group_id.clone()));
                }
                None => match self.options.missing_group {
                    MissingGroupPolicy::Skip => {
                        debug!(
                            issue_id = %record.issue_id,
                            creator = %record.creator_user_id,
                            "creator has no group; skipping"
                        );
                        outcomes.push(ItemOutcome::Skipped { issue_id: record.issue_id.clone() });
                    }
                    MissingGroupPolicy::Fail => {
                        warn!(
                            issue_id = %record.issue_id,
                            creator = %record.creator_user_id,
                            "creator has no group; counting as failed"
                        );
                        outcomes.push(ItemOutcome::Failed { issue_id: record.issue_id.clone() });
                    }
                },
            }
        }

        (outcomes, updates)
    }

    /// Processes one batch: validate, look up groups, then send the
    /// surviving updates concurrently up to the configured gate.
    ///
    /// Returns `Err` only for a fatal error (authentication); everything
    /// else becomes a per-record outcome.
    async fn run_batch(
        &self,
        batch_num: usize,
        batch: Vec<Issue>,
        groups: &HashMap<String, UserGroup>,
        processed: &Cell<usize>,
        intended: &RefCell<Vec<PlannedUpdate>>,
    ) -> Result<Vec<ItemOutcome>, ApiError> {
        let (mut outcomes, updates) = self.plan_batch(&batch, groups, intended);

        let update_results: Vec<Result<ItemOutcome, ApiError>> =
            stream::iter(updates.iter().map(|(issue_id, group_id)| async move {
                match self
                    .client
                    .update_creator_group(issue_id, group_id, self.options.dry_run)
                    .await
                {
                    Ok(true) => Ok(ItemOutcome::Updated {
                        issue_id: issue_id.clone(),
                        group_id: group_id.clone(),
                    }),
                    Ok(false) => Ok(ItemOutcome::Failed { issue_id: issue_id.clone() }),
                    Err(err) if err.is_fatal() => Err(err),
                    Err(err) => {
                        warn!(issue_id = %issue_id, error = %err, "update failed");
                        Ok(ItemOutcome::Failed { issue_id: issue_id.clone() })
                    }
                }
            }))
            .buffered(self.options.concurrency)
            .collect()
            .await;

        for update_result in update_results {
            outcomes.push(update_result?);
        }

        let updated = outcomes.iter().filter(|o| matches!(o, ItemOutcome::Updated { .. })).count();
        let failed = outcomes.iter().filter(|o| matches!(o, ItemOutcome::Failed { .. })).count();
        let skipped = outcomes.iter().filter(|o| matches!(o, ItemOutcome::Skipped { .. })).count();
        processed.set(processed.get() + batch.len());
        info!(
            batch = batch_num + self.options.resume_batches,
            updated, failed, skipped, "batch complete"
        );

        if let Some(store) = self.checkpoints {
            let results: Vec<String> = outcomes
                .iter()
                .filter_map(|outcome| match outcome {
                    ItemOutcome::Updated { issue_id, .. } => Some(issue_id.clone()),
                    _ => None,
                })
                .collect();
            let checkpoint = Checkpoint::new(
                batch_num + self.options.resume_batches,
                processed.get(),
                results,
            );
            if let Err(err) = store.save(&checkpoint) {
                warn!(error = %err, "failed to save checkpoint");
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::{BackfillProcessor, MissingGroupPolicy, ProcessorOptions};
    use crate::api::{ApiClient, ApiError};
    use crate::batch::BatchProcessor;
    use crate::checkpoint::CheckpointStore;
    use crate::config::Config;
    use crate::dry_run::DryRunRecorder;
    use crate::integrity::Mismatch;
    use crate::model::{Issue, UserGroup};
    use crate::ports::gateway::{GatewayFuture, TicketGateway};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory gateway with scriptable failures.
    #[derive(Default)]
    struct FakeGateway {
        groups: Vec<UserGroup>,
        update_calls: AtomicUsize,
        not_found_issue: Option<String>,
        reject_auth: bool,
    }

    impl TicketGateway for Arc<FakeGateway> {
        fn list_user_groups(&self, user_ids: &[String]) -> GatewayFuture<'_, Vec<UserGroup>> {
            let groups: Vec<UserGroup> = self
                .groups
                .iter()
                .filter(|group| user_ids.contains(&group.user_id))
                .cloned()
                .collect();
            Box::pin(async move { Ok(groups) })
        }

        fn update_creator_group(&self, issue_id: &str, _group_id: &str) -> GatewayFuture<'_, ()> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.reject_auth {
                Err(ApiError::Auth("token expired".to_string()))
            } else if self.not_found_issue.as_deref() == Some(issue_id) {
                Err(ApiError::NotFound(format!("{issue_id} does not exist")))
            } else {
                Ok(())
            };
            Box::pin(async move { result })
        }

        fn verify_auth(&self) -> GatewayFuture<'_, ()> {
            Box::pin(async move { Ok(()) })
        }
    }

    fn config() -> Config {
        let env = HashMap::from([
            ("DEVREV_API_TOKEN".to_string(), "token".to_string()),
            ("DEVREV_BASE_URL".to_string(), "https://api.devrev.ai".to_string()),
            ("RETRY_DELAY".to_string(), "0".to_string()),
        ]);
        Config::from_lookup(|name| env.get(name).cloned()).unwrap()
    }

    fn issue(issue_id: &str, creator: &str) -> Issue {
        Issue {
            issue_id: issue_id.to_string(),
            creator_user_id: creator.to_string(),
            assigned_group: "Support".to_string(),
            creator_group: None,
        }
    }

    fn group(user_id: &str, group_id: &str) -> UserGroup {
        UserGroup {
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            group_name: None,
        }
    }

    struct TempPath {
        path: PathBuf,
    }

    impl TempPath {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("regroup-processor-{}-{name}.json", std::process::id()));
            Self { path }
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[tokio::test]
    async fn updates_records_and_skips_creators_without_groups() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A"), group("USR-2", "GRP-B")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records =
            vec![issue("ISS-1", "USR-1"), issue("ISS-2", "USR-2"), issue("ISS-3", "USR-9")];

        let processor = BackfillProcessor::new(
            &client,
            BatchProcessor::new(10, 3),
            ProcessorOptions::default(),
        );
        let report = processor.run(&records).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.result.total_processed, 3);
        assert_eq!(report.result.successful_updates, 2);
        assert_eq!(report.result.failed_updates, 0);
        assert_eq!(report.result.skipped_updates, 1);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_group_can_be_treated_as_failure() {
        let gateway = Arc::new(FakeGateway::default());
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-9")];

        let options = ProcessorOptions {
            missing_group: MissingGroupPolicy::Fail,
            ..ProcessorOptions::default()
        };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(10, 3), options);
        let report = processor.run(&records).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.result.failed_updates, 1);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_records_are_skipped() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("", "USR-1"), issue("ISS-2", "USR-1")];

        let processor = BackfillProcessor::new(
            &client,
            BatchProcessor::new(10, 3),
            ProcessorOptions::default(),
        );
        let report = processor.run(&records).await.unwrap();

        assert_eq!(report.result.skipped_updates, 1);
        assert_eq!(report.result.successful_updates, 1);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dry_run_records_planned_updates_without_sending() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-1"), issue("ISS-2", "USR-1")];
        let recorder = DryRunRecorder::new();

        let options = ProcessorOptions { dry_run: true, ..ProcessorOptions::default() };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(10, 3), options)
            .with_recorder(&recorder);
        let report = processor.run(&records).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.result.successful_updates, 2);
        assert_eq!(recorder.len(), 2);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn saves_a_checkpoint_after_each_batch() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![
            issue("ISS-1", "USR-1"),
            issue("ISS-2", "USR-1"),
            issue("ISS-3", "USR-1"),
            issue("ISS-4", "USR-1"),
        ];
        let temp = TempPath::new("per-batch");
        let store = CheckpointStore::new(&temp.path);

        let processor = BackfillProcessor::new(
            &client,
            BatchProcessor::new(2, 3),
            ProcessorOptions::default(),
        )
        .with_checkpoints(&store);
        processor.run(&records).await.unwrap();

        let checkpoint = store.load().unwrap();
        assert_eq!(checkpoint.batch_num, 2);
        assert_eq!(checkpoint.items_processed, 4);
        assert_eq!(checkpoint.results, vec!["ISS-3".to_string(), "ISS-4".to_string()]);
    }

    #[tokio::test]
    async fn resume_skips_batches_a_previous_run_completed() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![
            issue("ISS-1", "USR-1"),
            issue("ISS-2", "USR-1"),
            issue("ISS-3", "USR-1"),
            issue("ISS-4", "USR-1"),
        ];

        let options = ProcessorOptions {
            resume_batches: 1,
            resume_items: 2,
            ..ProcessorOptions::default()
        };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(2, 3), options);
        let report = processor.run(&records).await.unwrap();

        assert_eq!(report.result.total_processed, 2);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resume_past_the_end_processes_nothing() {
        let gateway = Arc::new(FakeGateway::default());
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-1")];

        let options = ProcessorOptions { resume_batches: 5, ..ProcessorOptions::default() };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(2, 3), options);
        let report = processor.run(&records).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.result.total_processed, 0);
        assert_eq!(gateway.update_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn verify_reports_updates_that_did_not_apply() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            not_found_issue: Some("ISS-2".to_string()),
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-1"), issue("ISS-2", "USR-1")];

        let options = ProcessorOptions { verify: true, ..ProcessorOptions::default() };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(10, 3), options);
        let report = processor.run(&records).await.unwrap();

        assert_eq!(report.result.failed_updates, 1);
        let integrity = report.integrity.unwrap();
        assert_eq!(integrity.checked, 2);
        assert_eq!(
            integrity.mismatches,
            vec![Mismatch::NotApplied {
                issue_id: "ISS-2".to_string(),
                group_id: "GRP-A".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn verify_is_clean_when_every_update_applies() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-1")];

        let options = ProcessorOptions { verify: true, ..ProcessorOptions::default() };
        let processor = BackfillProcessor::new(&client, BatchProcessor::new(10, 3), options);
        let report = processor.run(&records).await.unwrap();

        assert!(report.integrity.unwrap().is_clean());
    }

    #[tokio::test]
    async fn authentication_failure_aborts_the_run() {
        let gateway = Arc::new(FakeGateway {
            groups: vec![group("USR-1", "GRP-A")],
            reject_auth: true,
            ..FakeGateway::default()
        });
        let client = ApiClient::new(Box::new(Arc::clone(&gateway)), &config());
        let records = vec![issue("ISS-1", "USR-1"), issue("ISS-2", "USR-1")];

        let processor = BackfillProcessor::new(
            &client,
            BatchProcessor::new(2, 1),
            ProcessorOptions::default(),
        );
        let report = processor.run(&records).await.unwrap();

        assert!(!report.is_success());
        assert!(report.aborted.is_some());
        assert_eq!(report.result.failed_updates, 2);
    }
}
