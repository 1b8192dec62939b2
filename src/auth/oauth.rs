//! Client for Linear's OAuth 2.0 endpoints.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{EnvOverrides, OAuthSettings};
use crate::constants::{OAUTH_AUTHORIZE_URL, OAUTH_REVOKE_URL, OAUTH_TOKEN_URL};
use crate::error::{AuthError, AuthResult};

/// Successful response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchanges a refresh token for a new token pair.
///
/// Implementations report `InvalidCredential` when the server rejected the
/// grant and `TransientNetworkError` when the outcome is unknown.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse>;
}

#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub revoke_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: OAUTH_AUTHORIZE_URL.to_string(),
            token_url: OAUTH_TOKEN_URL.to_string(),
            revoke_url: OAUTH_REVOKE_URL.to_string(),
        }
    }
}

pub struct OAuthClient {
    client: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: String,
    endpoints: OAuthEndpoints,
}

impl OAuthClient {
    pub fn new(settings: &OAuthSettings, env: &EnvOverrides, timeout_secs: u64) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            client_id: env.client_id.clone().or_else(|| settings.client_id.clone()),
            client_secret: env
                .client_secret
                .clone()
                .or_else(|| settings.client_secret.clone()),
            redirect_uri: settings.redirect_uri().to_string(),
            scopes: settings.scopes().to_string(),
            endpoints: OAuthEndpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    fn client_credentials(&self) -> AuthResult<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AuthError::Config(
                "OAuth client id and secret are required (set LINEAR_CLIENT_ID and LINEAR_CLIENT_SECRET, or oauth.client_id/client_secret in the config)".to_string(),
            )),
        }
    }

    /// Fresh random value for the `state` parameter.
    pub fn new_state() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn authorization_url(&self, state: &str) -> AuthResult<String> {
        let (client_id, _) = self.client_credentials()?;
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scopes.as_str()),
                ("state", state),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AuthError::Config(format!("Invalid authorize URL: {}", e)))?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> AuthResult<TokenResponse> {
        let (client_id, client_secret) = self.client_credentials()?;
        info!("Exchanging authorization code");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .await
    }

    /// Revoke an access token. Failures are logged, not returned: the local
    /// credential is removed regardless.
    pub async fn revoke(&self, access_token: &str) {
        let result = self
            .client
            .post(&self.endpoints.revoke_url)
            .bearer_auth(access_token)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!("Access token revoked"),
            Ok(resp) => warn!(status = %resp.status(), "Token revocation rejected"),
            Err(e) => warn!("Token revocation failed: {}", e),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::TransientNetworkError(format!("token request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response.json().await.map_err(|e| {
                AuthError::TransientNetworkError(format!("unreadable token response: {}", e))
            })?;
            if token.access_token.is_empty() {
                return Err(AuthError::OAuth("token response has no access_token".into()));
            }
            return Ok(token);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_token_error(status, &body))
    }
}

#[async_trait]
impl TokenRefresher for OAuthClient {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let (client_id, client_secret) = self.client_credentials()?;
        debug!("Refreshing OAuth access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .await
    }
}

/// Map a failed token endpoint response onto the error taxonomy.
pub fn classify_token_error(status: StatusCode, body: &str) -> AuthError {
    let parsed: Option<TokenErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.error.clone());
    let description = parsed
        .and_then(|b| b.error_description)
        .unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return AuthError::TransientNetworkError(format!("token endpoint returned {}", status));
    }

    match (status, code.as_deref()) {
        (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED, Some("invalid_grant")) => {
            AuthError::InvalidCredential(format!("refresh token rejected: {}", description))
        }
        (StatusCode::UNAUTHORIZED, None) => {
            AuthError::InvalidCredential("token endpoint returned 401".into())
        }
        (_, Some(code)) => AuthError::OAuth(if description.is_empty() {
            code.to_string()
        } else {
            format!("{}: {}", code, description)
        }),
        (_, None) => AuthError::OAuth(format!("token endpoint returned {}", status)),
    }
}

/// Seconds until expiry reported by the server, or the documented default.
pub fn expires_in_or_default(token: &TokenResponse) -> i64 {
    token
        .expires_in
        .filter(|s| *s > 0)
        .unwrap_or(crate::constants::DEFAULT_EXPIRES_IN_SECS)
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: None,
            client_secret: None,
            redirect_uri: crate::constants::DEFAULT_REDIRECT_URI.to_string(),
            scopes: crate::constants::DEFAULT_SCOPES.to_string(),
            endpoints: OAuthEndpoints::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TIMEOUT_SECS;

    #[test]
    fn test_invalid_grant_is_invalid_credential() {
        let err = classify_token_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"used"}"#,
        );
        assert!(matches!(err, AuthError::InvalidCredential(_)));
    }

    #[test]
    fn test_server_errors_are_transient() {
        for status in [StatusCode::BAD_GATEWAY, StatusCode::TOO_MANY_REQUESTS] {
            let err = classify_token_error(status, "");
            assert!(err.is_retryable(), "{} should be retryable", status);
        }
    }

    #[test]
    fn test_invalid_client_is_config_class() {
        let err = classify_token_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_client"}"#,
        );
        match err {
            AuthError::OAuth(msg) => assert_eq!(msg, "invalid_client"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_authorization_url_carries_state() {
        let settings = OAuthSettings {
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        let client = OAuthClient::new(&settings, &EnvOverrides::default(), DEFAULT_TIMEOUT_SECS)
            .unwrap();
        let url = client.authorization_url("xyz").unwrap();

        assert!(url.starts_with(OAUTH_AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=read%2Cwrite"));
    }

    #[test]
    fn test_missing_client_credentials() {
        let client = OAuthClient::default();
        assert!(!client.is_configured());
        assert!(matches!(client.authorization_url("s"), Err(AuthError::Config(_))));
    }
}
