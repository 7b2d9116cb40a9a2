//! Live adapter for the `TicketGateway` port using the DevRev REST API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::model::UserGroup;
use crate::ports::gateway::{GatewayFuture, TicketGateway};

const USERS_LIST_PATH: &str = "users.list";
const WORKS_UPDATE_PATH: &str = "works.update";
const USERS_SELF_PATH: &str = "users.self";

/// Live gateway that calls the DevRev API over HTTPS.
pub struct DevRevGateway {
    client: Client,
    base_url: String,
}

impl DevRevGateway {
    /// Creates a gateway with the bearer token installed as a default
    /// header and the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the token is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_token}"))
            .map_err(|e| ApiError::Transport(format!("API token is not a valid header: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

/// Request body for `users.list`.
#[derive(Serialize)]
struct UsersListRequest<'a> {
    ids: &'a [String],
}

/// Top-level response from `users.list`.
#[derive(Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    users: Vec<DevUser>,
}

/// A user entry in the `users.list` response.
#[derive(Deserialize)]
struct DevUser {
    id: String,
    #[serde(default)]
    group_refs: Vec<GroupRef>,
}

/// A group reference attached to a user; the first one is the primary
/// group.
#[derive(Deserialize)]
struct GroupRef {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Request body for `works.update`.
#[derive(Serialize)]
struct WorksUpdateRequest<'a> {
    id: &'a str,
    creator_group: GroupIdRef<'a>,
}

/// Group reference in a `works.update` body.
#[derive(Serialize)]
struct GroupIdRef<'a> {
    id: &'a str,
}

/// Error payload the platform returns on non-success statuses.
#[derive(Deserialize)]
struct DevRevErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Maps a non-success response to the error taxonomy, preferring the
/// platform's error message over the raw body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<DevRevErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or(body);
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
        StatusCode::UNAUTHORIZED => ApiError::Auth(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        _ => ApiError::Http { status: status.as_u16(), body: message },
    })
}

impl TicketGateway for DevRevGateway {
    fn list_user_groups(&self, user_ids: &[String]) -> GatewayFuture<'_, Vec<UserGroup>> {
        let ids = user_ids.to_vec();
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint(USERS_LIST_PATH))
                .json(&UsersListRequest { ids: &ids })
                .send()
                .await
                .map_err(|e| ApiError::Transport(format!("users.list request failed: {e}")))?;
            let response = check_status(response).await?;
            let parsed: UsersListResponse = response
                .json()
                .await
                .map_err(|e| ApiError::Transport(format!("failed to parse users.list response: {e}")))?;

            Ok(parsed
                .users
                .into_iter()
                .filter_map(|user| {
                    let DevUser { id, group_refs } = user;
                    group_refs.into_iter().next().map(|group| UserGroup {
                        user_id: id,
                        group_id: group.id,
                        group_name: group.name,
                    })
                })
                .collect())
        })
    }

    fn update_creator_group(&self, issue_id: &str, group_id: &str) -> GatewayFuture<'_, ()> {
        let issue_id = issue_id.to_string();
        let group_id = group_id.to_string();
        Box::pin(async move {
            let body =
                WorksUpdateRequest { id: &issue_id, creator_group: GroupIdRef { id: &group_id } };
            let response = self
                .client
                .post(self.endpoint(WORKS_UPDATE_PATH))
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::Transport(format!("works.update request failed: {e}")))?;
            check_status(response).await?;
            Ok(())
        })
    }

    fn verify_auth(&self) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.endpoint(USERS_SELF_PATH))
                .send()
                .await
                .map_err(|e| ApiError::Transport(format!("users.self request failed: {e}")))?;
            check_status(response).await?;
            Ok(())
        })
    }
}
