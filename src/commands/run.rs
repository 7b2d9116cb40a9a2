//! `regroup run` command.

use tracing::{info, warn};

use crate::adapters::DevRevGateway;
use crate::api::ApiClient;
use crate::batch::BatchProcessor;
use crate::checkpoint::CheckpointStore;
use crate::cli::{MissingGroup, RunArgs};
use crate::commands::RunStatus;
use crate::config::Config;
use crate::dry_run::DryRunRecorder;
use crate::processor::{BackfillProcessor, MissingGroupPolicy, ProcessorOptions};

/// Execute the `run` command.
///
/// # Errors
///
/// Returns an error string when configuration, the record source, or
/// the API connection check fails before processing starts, or when
/// consecutive batch failures abort the run.
pub async fn run(args: &RunArgs) -> Result<RunStatus, String> {
    let config = Config::from_env()?;

    let batch_size = args.batch_size.unwrap_or(config.batch_size);
    if batch_size == 0 {
        return Err("--batch-size must be at least 1".to_string());
    }

    let source = super::build_source(args.source, args.input.as_deref(), &config)?;
    source
        .test_connection()
        .await
        .map_err(|e| format!("source check failed: {e}"))?;
    let records = source
        .issues_missing_creator_group()
        .await
        .map_err(|e| format!("failed to load candidate records: {e}"))?;
    info!(records = records.len(), source = source.name(), "loaded candidate records");

    let gateway = DevRevGateway::new(&config.base_url, &config.api_token, config.timeout)
        .map_err(|e| format!("failed to build API client: {e}"))?;
    let client = ApiClient::new(Box::new(gateway), &config);
    if args.dry_run {
        info!("dry run; skipping the API connection check");
    } else {
        client
            .verify_connection()
            .await
            .map_err(|e| format!("API connection check failed: {e}"))?;
    }

    let checkpoint_store = args.checkpoint.as_ref().map(CheckpointStore::new);
    let mut options = ProcessorOptions {
        dry_run: args.dry_run,
        missing_group: match args.on_missing_group {
            MissingGroup::Skip => MissingGroupPolicy::Skip,
            MissingGroup::Fail => MissingGroupPolicy::Fail,
        },
        verify: args.verify,
        concurrency: config.update_concurrency,
        resume_batches: 0,
        resume_items: 0,
    };
    if args.resume {
        match checkpoint_store.as_ref().and_then(CheckpointStore::load) {
            Some(checkpoint) => {
                info!(
                    batch = checkpoint.batch_num,
                    items = checkpoint.items_processed,
                    "resuming from checkpoint"
                );
                options.resume_batches = checkpoint.batch_num;
                options.resume_items = checkpoint.items_processed;
            }
            None => info!("no usable checkpoint found; starting from the beginning"),
        }
    }

    let recorder = DryRunRecorder::new();
    let batch = BatchProcessor::new(batch_size, config.max_consecutive_failures);
    let mut processor = BackfillProcessor::new(&client, batch, options);
    if let Some(store) = &checkpoint_store {
        processor = processor.with_checkpoints(store);
    }
    if args.dry_run {
        processor = processor.with_recorder(&recorder);
    }

    let report = processor
        .run(&records)
        .await
        .map_err(|e| format!("backfill failed: {e}"))?;

    if args.dry_run {
        recorder.log_summary();
    }
    println!("{}", report.result);

    if let Some(reason) = &report.aborted {
        return Err(format!("run aborted: {reason}"));
    }
    if report.result.failed_updates > 0 {
        warn!(failed = report.result.failed_updates, "run completed with failed updates");
        return Ok(RunStatus::HadFailures);
    }
    Ok(RunStatus::Clean)
}
