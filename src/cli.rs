//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI parser for `regroup`.
#[derive(Debug, Parser)]
#[command(name = "regroup", version, about = "Backfill creator groups on DevRev issues")]
pub struct Cli {
    /// Log filter, e.g. `info` or `regroup=debug`.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the backfill against the configured source.
    Run(RunArgs),
    /// Check configuration, the record source, and API connectivity.
    Check(CheckArgs),
}

/// Arguments for `regroup run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Where candidate records come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Csv)]
    pub source: SourceKind,

    /// Path of the candidate CSV file; defaults to `CSV_INPUT_PATH`.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Records per batch; defaults to `BATCH_SIZE`.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Plan updates and report them without sending anything.
    #[arg(long)]
    pub dry_run: bool,

    /// What to do with a record whose creator has no resolved group.
    #[arg(long, value_enum, default_value_t = MissingGroup::Skip)]
    pub on_missing_group: MissingGroup,

    /// Write a progress checkpoint to this file after every batch.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Skip batches already covered by the checkpoint file.
    #[arg(long, requires = "checkpoint")]
    pub resume: bool,

    /// Compare intended and applied updates after the run.
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for `regroup check`.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Where candidate records come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Csv)]
    pub source: SourceKind,

    /// Path of the candidate CSV file; defaults to `CSV_INPUT_PATH`.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

/// Candidate record source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Read candidates from a CSV export.
    Csv,
    /// Query candidates from the Snowflake warehouse.
    Snowflake,
}

/// Policy for records whose creator has no resolved group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingGroup {
    /// Skip the record; it is counted but not treated as a failure.
    Skip,
    /// Count the record as a failed update.
    Fail,
}
