//! `regroup check` command.

use crate::adapters::DevRevGateway;
use crate::api::ApiClient;
use crate::cli::CheckArgs;
use crate::commands::RunStatus;
use crate::config::Config;

/// Execute the `check` command: load configuration, probe the record
/// source, and confirm the API credential, without touching any data.
///
/// # Errors
///
/// Returns an error string naming the first check that failed.
pub async fn run(args: &CheckArgs) -> Result<RunStatus, String> {
    let config = Config::from_env()?;
    println!("Configuration loaded.");

    let source = super::build_source(args.source, args.input.as_deref(), &config)?;
    source
        .test_connection()
        .await
        .map_err(|e| format!("source check failed: {e}"))?;
    println!("Source '{}' is reachable.", source.name());

    let gateway = DevRevGateway::new(&config.base_url, &config.api_token, config.timeout)
        .map_err(|e| format!("failed to build API client: {e}"))?;
    let client = ApiClient::new(Box::new(gateway), &config);
    client
        .verify_connection()
        .await
        .map_err(|e| format!("API connection check failed: {e}"))?;
    println!("API credential accepted.");

    Ok(RunStatus::Clean)
}
