//! Command dispatch and handlers.

pub mod check;
pub mod run;

use std::path::Path;
use std::process::ExitCode;

use crate::adapters::{CsvSource, WarehouseSource};
use crate::cli::{Cli, Command, SourceKind};
use crate::config::Config;
use crate::ports::source::IssueSource;

/// Outcome of a completed command, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything the command attempted worked.
    Clean,
    /// The run completed but at least one update failed.
    HadFailures,
}

impl RunStatus {
    /// The exit code this status maps to.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::HadFailures => ExitCode::FAILURE,
        }
    }
}

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub async fn dispatch(cli: &Cli) -> Result<RunStatus, String> {
    match &cli.command {
        Command::Run(args) => run::run(args).await,
        Command::Check(args) => check::run(args).await,
    }
}

/// Builds the record source selected on the command line.
///
/// A CSV path given on the command line wins over the configured one.
///
/// # Errors
///
/// Returns an error string when the source cannot be constructed, e.g.
/// missing warehouse settings.
fn build_source(
    kind: SourceKind,
    input: Option<&Path>,
    config: &Config,
) -> Result<Box<dyn IssueSource>, String> {
    match kind {
        SourceKind::Csv => {
            let path = input.map_or_else(|| config.csv_input_path.clone(), Path::to_path_buf);
            Ok(Box::new(CsvSource::new(path)))
        }
        SourceKind::Snowflake => {
            let settings = config.snowflake()?;
            let source = WarehouseSource::new(settings, config.timeout)
                .map_err(|e| format!("failed to build warehouse source: {e}"))?;
            Ok(Box::new(source))
        }
    }
}
