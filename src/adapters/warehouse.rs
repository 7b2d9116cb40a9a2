//! Warehouse implementation of the `IssueSource` port using the
//! Snowflake SQL API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SnowflakeConfig;
use crate::model::Issue;
use crate::ports::source::{IssueSource, SourceError, SourceFuture};

const STATEMENTS_PATH: &str = "/api/v2/statements";

const CANDIDATE_QUERY: &str = "SELECT issue_id, creator_user_id, assigned_group, creator_group \
     FROM issues WHERE creator_group IS NULL ORDER BY issue_id";

const CONNECTION_QUERY: &str = "SELECT CURRENT_VERSION()";

/// Reads backfill candidates by running SQL statements against the
/// warehouse's HTTP statement endpoint.
pub struct WarehouseSource {
    client: Client,
    settings: SnowflakeConfig,
}

/// Body for the statements endpoint.
#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse: &'a str,
    database: &'a str,
    schema: &'a str,
}

/// The slice of the statement response this adapter consumes: rows as
/// positional arrays of nullable strings.
#[derive(Deserialize)]
struct StatementResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

impl WarehouseSource {
    /// Creates a source for the given validated warehouse settings.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connection`] when the token is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(settings: SnowflakeConfig, timeout: Duration) -> Result<Self, SourceError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token))
            .map_err(|e| SourceError::Connection(format!("warehouse token is not a valid header: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    async fn execute(&self, statement: &str) -> Result<StatementResponse, SourceError> {
        let url = format!("{}{STATEMENTS_PATH}", self.settings.account_url.trim_end_matches('/'));
        let body = StatementRequest {
            statement,
            warehouse: &self.settings.warehouse,
            database: &self.settings.database,
            schema: &self.settings.schema,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Connection(format!("statement request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SourceError::Query(format!(
                "statement rejected (status {}): {detail}",
                status.as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("failed to parse statement response: {e}")))
    }
}

/// Builds an issue from one positional result row. Short rows produce
/// empty fields, which validation rejects later.
fn issue_from_columns(row: Vec<Option<String>>) -> Issue {
    let mut columns = row.into_iter();
    let mut next = || columns.next().flatten().unwrap_or_default().trim().to_string();
    Issue {
        issue_id: next(),
        creator_user_id: next(),
        assigned_group: next(),
        creator_group: None,
    }
}

impl IssueSource for WarehouseSource {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn issues_missing_creator_group(&self) -> SourceFuture<'_, Vec<Issue>> {
        Box::pin(async move {
            let response = self.execute(CANDIDATE_QUERY).await?;
            Ok(response.data.into_iter().map(issue_from_columns).collect())
        })
    }

    fn test_connection(&self) -> SourceFuture<'_, ()> {
        Box::pin(async move {
            self.execute(CONNECTION_QUERY).await?;
            Ok(())
        })
    }
}
