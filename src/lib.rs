//! Core library entry for the `regroup` CLI.

pub mod adapters;
pub mod api;
pub mod batch;
pub mod cache;
pub mod checkpoint;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dry_run;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod ports;
pub mod processor;
pub mod resilience;
pub mod validate;

use clap::error::ErrorKind;
use clap::Parser;

use commands::RunStatus;

/// Run the CLI with the provided arguments.
///
/// Loads `.env` if present, then parses arguments and dispatches the
/// selected command on a single-threaded async runtime. `--help` and
/// `--version` print to stdout and report success.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command
/// execution fails.
pub fn run<I, T>(args: I) -> Result<RunStatus, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let _ = dotenvy::dotenv();

    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print().map_err(|e| format!("failed to print help: {e}"))?;
            return Ok(RunStatus::Clean);
        }
        Err(err) => return Err(err.to_string()),
    };

    logging::init(&cli.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    runtime.block_on(commands::dispatch(&cli))
}
