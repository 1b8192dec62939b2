mod error_tests;
mod store_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::{TokenRefresher, TokenResponse};
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, OAuthTokenPair};

/// Scripted refresher that counts calls.
pub(crate) struct MockRefresher {
    calls: AtomicUsize,
    delay: Option<StdDuration>,
    outcome: Mutex<MockOutcome>,
}

#[derive(Clone)]
pub(crate) enum MockOutcome {
    Tokens {
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
    },
    Rejected,
    Offline,
}

impl MockRefresher {
    pub fn issuing(access_token: &str, refresh_token: Option<&str>, expires_in: i64) -> Self {
        Self::with_outcome(MockOutcome::Tokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in,
        })
    }

    pub fn rejecting() -> Self {
        Self::with_outcome(MockOutcome::Rejected)
    }

    pub fn offline() -> Self {
        Self::with_outcome(MockOutcome::Offline)
    }

    fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            outcome: Mutex::new(outcome),
        }
    }

    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(&self, _refresh_token: &str) -> AuthResult<TokenResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            MockOutcome::Tokens {
                access_token,
                refresh_token,
                expires_in,
            } => Ok(TokenResponse {
                access_token,
                refresh_token,
                expires_in: Some(expires_in),
                token_type: Some("Bearer".to_string()),
                scope: None,
            }),
            MockOutcome::Rejected => Err(AuthError::InvalidCredential(
                "refresh token rejected: invalid_grant".to_string(),
            )),
            MockOutcome::Offline => Err(AuthError::TransientNetworkError(
                "connection refused".to_string(),
            )),
        }
    }
}

pub(crate) fn oauth_pair(access: &str, refresh: &str, expires_in: Duration) -> Credential {
    Credential::OAuth(OAuthTokenPair {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: Utc::now() + expires_in,
        workspace_id: "org-acme".to_string(),
    })
}
