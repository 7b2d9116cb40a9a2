//! Binary entrypoint for the `regroup` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match regroup::run(std::env::args()) {
        Ok(status) => status.exit_code(),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
