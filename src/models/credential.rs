use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PROFILE;

/// Identifies one persisted credential: a workspace and a profile inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub workspace_id: String,
    pub profile: String,
}

impl CredentialKey {
    pub fn new(workspace_id: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            profile: profile.into(),
        }
    }

    pub fn default_profile(workspace_id: impl Into<String>) -> Self {
        Self::new(workspace_id, DEFAULT_PROFILE)
    }

    /// Account name used for keyring entries and encrypted file slots.
    pub fn account(&self) -> String {
        format!("{}:{}", self.workspace_id, self.profile)
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (profile {})", self.workspace_id, self.profile)
    }
}

/// Authentication material for the Linear API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    ApiKey { key: String },
    #[serde(rename = "oauth")]
    OAuth(OAuthTokenPair),
}

impl Credential {
    pub fn api_key(key: impl Into<String>) -> Self {
        Credential::ApiKey { key: key.into() }
    }

    /// Value for the `Authorization` header. Personal API keys are sent bare,
    /// OAuth access tokens as bearer tokens.
    pub fn authorization_header(&self) -> String {
        match self {
            Credential::ApiKey { key } => key.clone(),
            Credential::OAuth(pair) => format!("Bearer {}", pair.access_token),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey { .. } => "API key",
            Credential::OAuth(_) => "OAuth",
        }
    }

    /// The secret handed to the API, masked for display.
    pub fn masked(&self) -> String {
        match self {
            Credential::ApiKey { key } => mask_secret(key),
            Credential::OAuth(pair) => mask_secret(&pair.access_token),
        }
    }

    pub fn as_api_key(&self) -> Option<&str> {
        match self {
            Credential::ApiKey { key } => Some(key),
            Credential::OAuth(_) => None,
        }
    }

    pub fn as_oauth(&self) -> Option<&OAuthTokenPair> {
        match self {
            Credential::OAuth(pair) => Some(pair),
            Credential::ApiKey { .. } => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey { key } => f
                .debug_struct("ApiKey")
                .field("key", &mask_secret(key))
                .finish(),
            Credential::OAuth(pair) => f.debug_tuple("OAuth").field(pair).finish(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub workspace_id: String,
}

impl OAuthTokenPair {
    /// True once `now` is inside the safety margin before expiry (or past it).
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

impl fmt::Debug for OAuthTokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenPair")
            .field("access_token", &mask_secret(&self.access_token))
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}

/// Keep the first and last four characters of long secrets.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len().max(3));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
