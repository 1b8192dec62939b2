//! Token lifecycle manager.
//!
//! Hands out credentials that are ready to use, refreshing OAuth pairs lazily
//! when they enter the safety margin before expiry. Refreshes are serialized
//! per (workspace, profile) so a single-use refresh token is never spent twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use super::oauth::{expires_in_or_default, TokenRefresher};
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey, OAuthTokenPair};
use crate::store::CredentialStore;

/// Where a stored credential sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing stored for the key.
    Unauthenticated,
    /// Usable without a network call (API keys are always `Valid`).
    Valid,
    /// Inside the safety margin or past expiry; the next acquire refreshes.
    NearExpiry,
    /// A refresh for the key is in flight in this process.
    Refreshing,
    /// The server rejected the refresh token; login is required.
    Expired,
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenState::Unauthenticated => "unauthenticated",
            TokenState::Valid => "valid",
            TokenState::NearExpiry => "near expiry",
            TokenState::Refreshing => "refreshing",
            TokenState::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// Per-key refresh coordination. `generation` counts finished refreshes and
/// `last` holds the most recent outcome so queued callers can share it.
#[derive(Default)]
struct RefreshSlot {
    generation: AtomicU64,
    last: tokio::sync::Mutex<Option<AuthResult<Credential>>>,
}

fn replay(outcome: &AuthResult<Credential>) -> AuthResult<Credential> {
    match outcome {
        Ok(credential) => Ok(credential.clone()),
        Err(e) => Err(e.duplicate()),
    }
}

pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    safety_margin: Duration,
    refresh_slots: Mutex<HashMap<CredentialKey, Arc<RefreshSlot>>>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        safety_margin: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            safety_margin,
            refresh_slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Classify a credential against the clock, ignoring in-flight refreshes.
    pub fn classify(&self, credential: &Credential) -> TokenState {
        match credential {
            Credential::ApiKey { .. } => TokenState::Valid,
            Credential::OAuth(pair) => {
                if pair.needs_refresh(Utc::now(), self.safety_margin) {
                    TokenState::NearExpiry
                } else {
                    TokenState::Valid
                }
            }
        }
    }

    /// Current state for `key`, consulting the store and the refresh lock.
    pub fn state(&self, key: &CredentialKey) -> AuthResult<TokenState> {
        if self.refresh_in_flight(key) {
            return Ok(TokenState::Refreshing);
        }
        match self.store.get(key) {
            Ok(credential) => Ok(self.classify(&credential)),
            Err(AuthError::NotFound(_)) => Ok(TokenState::Unauthenticated),
            Err(e) => Err(e),
        }
    }

    /// Return a credential for `key` that is ready to use.
    ///
    /// Valid credentials are returned straight from the store. OAuth pairs
    /// inside the safety margin are refreshed first, with at most one refresh
    /// in flight per key; concurrent callers wait for and share its outcome,
    /// success or failure.
    pub async fn acquire(&self, key: &CredentialKey) -> AuthResult<Credential> {
        let slot = self.refresh_slot(key);
        let seen_generation = slot.generation.load(Ordering::Acquire);

        let credential = self.store.get(key)?;
        let pair = match &credential {
            Credential::ApiKey { .. } => return Ok(credential),
            Credential::OAuth(pair) => pair,
        };

        if !pair.needs_refresh(Utc::now(), self.safety_margin) {
            return Ok(credential);
        }

        debug!(key = %key, expires_at = %pair.expires_at, "Access token near expiry");
        let seen = pair.refresh_token.clone();
        let result = self
            .refresh_serialized(key, &slot, seen_generation, &seen, false)
            .await;
        drop(slot);
        self.prune_slots();
        result
    }

    /// Refresh the OAuth pair for `key` now, even if it is still valid.
    /// API keys are returned unchanged.
    pub async fn force_refresh(&self, key: &CredentialKey) -> AuthResult<Credential> {
        let slot = self.refresh_slot(key);
        let seen_generation = slot.generation.load(Ordering::Acquire);

        let credential = self.store.get(key)?;
        let seen = match &credential {
            Credential::ApiKey { .. } => return Ok(credential),
            Credential::OAuth(pair) => pair.refresh_token.clone(),
        };
        info!(key = %key, "Forced token refresh");
        let result = self
            .refresh_serialized(key, &slot, seen_generation, &seen, true)
            .await;
        drop(slot);
        self.prune_slots();
        result
    }

    fn refresh_slot(&self, key: &CredentialKey) -> Arc<RefreshSlot> {
        let mut slots = self
            .refresh_slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    fn prune_slots(&self) {
        let mut slots = self
            .refresh_slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    fn refresh_in_flight(&self, key: &CredentialKey) -> bool {
        let slots = self
            .refresh_slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .get(key)
            .map(|slot| slot.last.try_lock().is_err())
            .unwrap_or(false)
    }

    /// `seen_generation` is the slot generation observed before the caller
    /// read the store. If it moved by the time the lock is ours, a refresh
    /// finished while we queued and its outcome is returned as is.
    /// `seen_refresh_token` catches refreshes done by other processes.
    async fn refresh_serialized(
        &self,
        key: &CredentialKey,
        slot: &RefreshSlot,
        seen_generation: u64,
        seen_refresh_token: &str,
        force: bool,
    ) -> AuthResult<Credential> {
        let mut last = slot.last.lock().await;

        if slot.generation.load(Ordering::Acquire) != seen_generation {
            if let Some(outcome) = last.as_ref() {
                debug!(key = %key, ok = outcome.is_ok(), "Sharing outcome of concurrent refresh");
                return replay(outcome);
            }
        }

        let current = self.store.get(key)?;
        let pair = match &current {
            Credential::ApiKey { .. } => return Ok(current),
            Credential::OAuth(pair) => pair.clone(),
        };

        if pair.refresh_token != seen_refresh_token {
            debug!(key = %key, "Token refreshed by another caller");
            return Ok(current);
        }
        if !force && !pair.needs_refresh(Utc::now(), self.safety_margin) {
            return Ok(current);
        }

        let outcome = self.perform_refresh(key, pair).await;
        let result = replay(&outcome);
        *last = Some(outcome);
        slot.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn perform_refresh(
        &self,
        key: &CredentialKey,
        pair: OAuthTokenPair,
    ) -> AuthResult<Credential> {
        match self.refresher.refresh(&pair.refresh_token).await {
            Ok(response) => {
                let expires_in = expires_in_or_default(&response);
                let refreshed = Credential::OAuth(OAuthTokenPair {
                    access_token: response.access_token,
                    refresh_token: response
                        .refresh_token
                        .filter(|t| !t.is_empty())
                        .unwrap_or(pair.refresh_token),
                    expires_at: Utc::now() + Duration::seconds(expires_in),
                    workspace_id: pair.workspace_id,
                });

                if let Err(e) = self.store.put(key, &refreshed) {
                    error!(key = %key, "Refreshed token could not be persisted: {}", e);
                    return Err(e);
                }
                info!(key = %key, expires_in, "Token refreshed");
                Ok(refreshed)
            }
            Err(AuthError::InvalidCredential(reason)) => {
                warn!(key = %key, "Refresh token rejected: {}", reason);
                self.store.delete(key)?;
                Err(AuthError::AuthenticationRequired {
                    workspace: key.workspace_id.clone(),
                })
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(key = %key, "Token refresh failed, stored credential kept: {}", e);
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("store", &self.store.name())
            .field("safety_margin", &self.safety_margin)
            .finish()
    }
}
