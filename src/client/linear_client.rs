use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::constants::{LINEAR_API_URL, VIEWER_FIELDS};
use crate::error::{AuthError, AuthResult};
use crate::models::graphql::{GraphQLResponse, ViewerData};
use crate::models::{Credential, Viewer};

/// Bearer-authenticated GraphQL client for one credential.
pub struct LinearClient {
    client: reqwest::Client,
    api_url: String,
}

/// Outcome of a live round trip, shown by `auth status --verbose`.
#[derive(Debug)]
pub struct ConnectionTest {
    pub response_time: Duration,
    pub viewer: Viewer,
}

impl LinearClient {
    pub fn new(credential: &Credential, api_url: Option<&str>, timeout_secs: u64) -> AuthResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&credential.authorization_header())
            .map_err(|_| AuthError::InvalidCredential("credential contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.unwrap_or(LINEAR_API_URL).to_string(),
        })
    }

    async fn execute_query<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> AuthResult<T> {
        let body = match variables {
            Some(vars) => json!({ "query": query, "variables": vars }),
            None => json!({ "query": query }),
        };

        let response = self.client.post(&self.api_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AuthError::InvalidCredential(format!("Linear API rejected the credential ({})", status))
                }
                s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                    AuthError::TransientNetworkError(format!("Linear API returned {}", s))
                }
                s => AuthError::Api(format!("HTTP error: {}", s)),
            });
        }

        let graphql_response: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = graphql_response.errors {
            let error_messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            return Err(AuthError::Api(format!("GraphQL errors: {}", error_messages.join(", "))));
        }

        graphql_response
            .data
            .ok_or_else(|| AuthError::Api("No data returned from GraphQL query".into()))
    }

    pub async fn get_viewer(&self) -> AuthResult<Viewer> {
        let query = format!("query {{ viewer {{{}}} }}", VIEWER_FIELDS);
        let data: ViewerData = self.execute_query(&query, None).await?;
        debug!(organization = %data.viewer.organization.id, "Viewer fetched");
        Ok(data.viewer)
    }

    pub async fn test_connection(&self) -> AuthResult<ConnectionTest> {
        let start = Instant::now();
        let viewer = self.get_viewer().await?;
        Ok(ConnectionTest {
            response_time: start.elapsed(),
            viewer,
        })
    }
}
