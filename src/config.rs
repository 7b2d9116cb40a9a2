//! Environment-sourced configuration.
//!
//! All settings come from environment variables (a `.env` file is loaded
//! before parsing). Only the API token and base URL are required; every
//! tuning knob has a default matching normal production use.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for a backfill run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the DevRev API (`DEVREV_API_TOKEN`).
    pub api_token: String,
    /// Base URL of the DevRev API (`DEVREV_BASE_URL`).
    pub base_url: String,
    /// Records per batch (`BATCH_SIZE`, default 100).
    pub batch_size: usize,
    /// Attempts per API call including the first (`MAX_RETRIES`, default 3).
    pub max_retries: u32,
    /// Base delay between retry attempts (`RETRY_DELAY` seconds, default 1).
    pub retry_delay: Duration,
    /// Per-request HTTP timeout (`TIMEOUT` seconds, default 30).
    pub timeout: Duration,
    /// Lifetime of cached group lookups (`CACHE_TTL` seconds, default 3600).
    pub cache_ttl: Duration,
    /// Path of the CSV input file (`CSV_INPUT_PATH`, default `input_data.csv`).
    pub csv_input_path: PathBuf,
    /// Calls allowed per rate-limit window (`RATE_LIMIT_CALLS`, default 50).
    pub rate_limit_calls: usize,
    /// Width of the rate-limit window (`RATE_LIMIT_PERIOD` seconds, default 10).
    pub rate_limit_period: Duration,
    /// Concurrent update calls per batch (`UPDATE_CONCURRENCY`, default 10).
    pub update_concurrency: usize,
    /// Failed batches in a row before the run aborts
    /// (`MAX_CONSECUTIVE_FAILURES`, default 3).
    pub max_consecutive_failures: u32,
    /// API failures in a row before the circuit opens
    /// (`CIRCUIT_FAILURE_THRESHOLD`, default 5).
    pub circuit_failure_threshold: u32,
    /// How long an open circuit waits before a trial call
    /// (`CIRCUIT_RESET_TIMEOUT` seconds, default 60).
    pub circuit_reset_timeout: Duration,
    snowflake: SnowflakeSettings,
}

/// Raw warehouse settings, validated only when that source is selected.
#[derive(Debug, Clone, Default)]
struct SnowflakeSettings {
    account_url: Option<String>,
    token: Option<String>,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

/// Validated settings for the warehouse source.
#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    /// Account base URL, e.g. `https://acme.snowflakecomputing.com`.
    pub account_url: String,
    /// Bearer token for the SQL API.
    pub token: String,
    /// Warehouse to run statements on.
    pub warehouse: String,
    /// Database holding the issues table.
    pub database: String,
    /// Schema holding the issues table.
    pub schema: String,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the first variable that is missing
    /// or fails to parse.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// Empty and whitespace-only values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the first variable that is missing
    /// or fails to parse.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, String>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_token: required(&lookup, "DEVREV_API_TOKEN")?,
            base_url: required(&lookup, "DEVREV_BASE_URL")?,
            batch_size: parse_count(&lookup, "BATCH_SIZE", 100)?,
            max_retries: parse_count_u32(&lookup, "MAX_RETRIES", 3)?,
            retry_delay: parse_secs(&lookup, "RETRY_DELAY", 1)?,
            timeout: parse_secs(&lookup, "TIMEOUT", 30)?,
            cache_ttl: parse_secs(&lookup, "CACHE_TTL", 3600)?,
            csv_input_path: get(&lookup, "CSV_INPUT_PATH")
                .map_or_else(|| PathBuf::from("input_data.csv"), PathBuf::from),
            rate_limit_calls: parse_count(&lookup, "RATE_LIMIT_CALLS", 50)?,
            rate_limit_period: parse_secs(&lookup, "RATE_LIMIT_PERIOD", 10)?,
            update_concurrency: parse_count(&lookup, "UPDATE_CONCURRENCY", 10)?,
            max_consecutive_failures: parse_count_u32(&lookup, "MAX_CONSECUTIVE_FAILURES", 3)?,
            circuit_failure_threshold: parse_count_u32(&lookup, "CIRCUIT_FAILURE_THRESHOLD", 5)?,
            circuit_reset_timeout: parse_secs(&lookup, "CIRCUIT_RESET_TIMEOUT", 60)?,
            snowflake: SnowflakeSettings {
                account_url: get(&lookup, "SNOWFLAKE_ACCOUNT_URL"),
                token: get(&lookup, "SNOWFLAKE_TOKEN"),
                warehouse: get(&lookup, "SNOWFLAKE_WAREHOUSE"),
                database: get(&lookup, "SNOWFLAKE_DATABASE"),
                schema: get(&lookup, "SNOWFLAKE_SCHEMA"),
            },
        })
    }

    /// Assembles the warehouse settings.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the first missing `SNOWFLAKE_*`
    /// variable.
    pub fn snowflake(&self) -> Result<SnowflakeConfig, String> {
        Ok(SnowflakeConfig {
            account_url: snowflake_field(&self.snowflake.account_url, "SNOWFLAKE_ACCOUNT_URL")?,
            token: snowflake_field(&self.snowflake.token, "SNOWFLAKE_TOKEN")?,
            warehouse: snowflake_field(&self.snowflake.warehouse, "SNOWFLAKE_WAREHOUSE")?,
            database: snowflake_field(&self.snowflake.database, "SNOWFLAKE_DATABASE")?,
            schema: snowflake_field(&self.snowflake.schema, "SNOWFLAKE_SCHEMA")?,
        })
    }
}

fn get<L>(lookup: &L, name: &str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required<L>(lookup: &L, name: &str) -> Result<String, String>
where
    L: Fn(&str) -> Option<String>,
{
    get(lookup, name).ok_or_else(|| format!("{name} environment variable is required"))
}

fn parse_count<L>(lookup: &L, name: &str, default: usize) -> Result<usize, String>
where
    L: Fn(&str) -> Option<String>,
{
    match get(lookup, name) {
        Some(raw) => {
            let value: usize =
                raw.parse().map_err(|e| format!("{name} must be an integer: {e}"))?;
            if value == 0 {
                return Err(format!("{name} must be at least 1"));
            }
            Ok(value)
        }
        None => Ok(default),
    }
}

fn parse_count_u32<L>(lookup: &L, name: &str, default: u32) -> Result<u32, String>
where
    L: Fn(&str) -> Option<String>,
{
    match get(lookup, name) {
        Some(raw) => {
            let value: u32 = raw.parse().map_err(|e| format!("{name} must be an integer: {e}"))?;
            if value == 0 {
                return Err(format!("{name} must be at least 1"));
            }
            Ok(value)
        }
        None => Ok(default),
    }
}

fn parse_secs<L>(lookup: &L, name: &str, default: u64) -> Result<Duration, String>
where
    L: Fn(&str) -> Option<String>,
{
    match get(lookup, name) {
        Some(raw) => {
            let secs: u64 =
                raw.parse().map_err(|e| format!("{name} must be a number of seconds: {e}"))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(Duration::from_secs(default)),
    }
}

fn snowflake_field(value: &Option<String>, name: &str) -> Result<String, String> {
    value
        .clone()
        .ok_or_else(|| format!("{name} environment variable is required for the snowflake source"))
}
