//! Logging setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// A `RUST_LOG` environment filter takes precedence over the provided
/// level. Repeated calls after the first are no-ops.
pub fn init(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).try_init();
}
