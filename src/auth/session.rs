//! The single entry point commands use to authenticate API requests.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::oauth::{expires_in_or_default, TokenRefresher};
use super::token_manager::TokenManager;
use crate::config::{Config, EnvOverrides};
use crate::constants::DEFAULT_PROFILE;
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey, OAuthTokenPair, WorkspaceContext};

/// Where the session's credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Flag,
    Environment,
    Store,
    ConfigFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialSource::Flag => "command-line flag",
            CredentialSource::Environment => "environment",
            CredentialSource::Store => "credential store",
            CredentialSource::ConfigFile => "config file (plaintext)",
        };
        f.write_str(label)
    }
}

/// A workspace bound to a credential that is ready to use. Lives for one
/// command invocation and is never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    pub workspace: WorkspaceContext,
    pub profile: String,
    pub credential: Credential,
    pub source: CredentialSource,
}

impl Session {
    pub fn authorization_header(&self) -> String {
        self.credential.authorization_header()
    }

    pub fn key(&self) -> CredentialKey {
        CredentialKey::new(self.workspace.id.clone(), self.profile.clone())
    }
}

/// Per-invocation options that outrank everything else.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub workspace: Option<String>,
    pub api_key: Option<String>,
}

impl SessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Resolves the active workspace and returns bound sessions.
///
/// Credential precedence: explicit flag, then environment, then the
/// credential store (through the token manager), then the plaintext API key
/// in the config file when the user opted into that fallback.
pub struct AuthFacade {
    config: Config,
    env: EnvOverrides,
    profile: String,
    tokens: TokenManager,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthFacade {
    pub fn new(
        config: Config,
        env: EnvOverrides,
        profile: Option<String>,
        tokens: TokenManager,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let profile = profile
            .or_else(|| env.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        Self {
            config,
            env,
            profile,
            tokens,
            refresher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn env(&self) -> &EnvOverrides {
        &self.env
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Flag, then `LINEAR_WORKSPACE`, then the persisted default.
    pub fn resolve_workspace(&self, flag: Option<&str>) -> AuthResult<WorkspaceContext> {
        if let Some(name) = flag {
            return self
                .config
                .find_workspace(name)
                .cloned()
                .ok_or_else(|| AuthError::UnknownWorkspace(name.to_string()));
        }
        if let Some(name) = self.env.workspace.as_deref() {
            return self
                .config
                .find_workspace(name)
                .cloned()
                .ok_or_else(|| AuthError::UnknownWorkspace(name.to_string()));
        }
        self.config
            .default_workspace()
            .cloned()
            .ok_or(AuthError::NoActiveWorkspace)
    }

    pub fn key_for(&self, workspace: &WorkspaceContext) -> CredentialKey {
        CredentialKey::new(workspace.id.clone(), self.profile.clone())
    }

    /// Build a session for the request.
    pub async fn session(&self, request: &SessionRequest) -> AuthResult<Session> {
        let resolved = self.resolve_workspace(request.workspace.as_deref());

        if let Some(key) = request.api_key.as_deref() {
            return self.bind(request, resolved, Credential::api_key(key), CredentialSource::Flag);
        }

        if let Some(credential) = self.env_credential().await? {
            debug!("Using credential from environment");
            return self.bind(request, resolved, credential, CredentialSource::Environment);
        }

        let workspace = resolved?;
        let key = self.key_for(&workspace);
        match self.tokens.acquire(&key).await {
            Ok(credential) => Ok(Session {
                workspace,
                profile: self.profile.clone(),
                credential,
                source: CredentialSource::Store,
            }),
            Err(AuthError::NotFound(_)) | Err(AuthError::StoreUnavailable(_))
                if self.config.api_key.is_some() =>
            {
                debug!("Falling back to plaintext API key from config");
                Ok(Session {
                    workspace,
                    profile: self.profile.clone(),
                    credential: Credential::api_key(self.config.api_key.clone().unwrap_or_default()),
                    source: CredentialSource::ConfigFile,
                })
            }
            Err(AuthError::NotFound(_)) => Err(AuthError::AuthenticationRequired {
                workspace: workspace.name.clone(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Flag and environment credentials work without a known workspace, but
    /// a `--workspace` that names nothing is still an error.
    fn bind(
        &self,
        request: &SessionRequest,
        resolved: AuthResult<WorkspaceContext>,
        credential: Credential,
        source: CredentialSource,
    ) -> AuthResult<Session> {
        let workspace = match resolved {
            Ok(workspace) => workspace,
            Err(e @ AuthError::UnknownWorkspace(_)) if request.workspace.is_some() => return Err(e),
            Err(_) => WorkspaceContext::ephemeral(),
        };
        Ok(Session {
            workspace,
            profile: self.profile.clone(),
            credential,
            source,
        })
    }

    /// `LINEAR_ACCESS_TOKEN`, then `LINEAR_API_KEY`, then a one-off exchange of
    /// `LINEAR_REFRESH_TOKEN`. The exchanged pair is not persisted.
    async fn env_credential(&self) -> AuthResult<Option<Credential>> {
        if let Some(token) = self.env.access_token.as_deref() {
            return Ok(Some(Credential::OAuth(OAuthTokenPair {
                access_token: token.to_string(),
                refresh_token: self.env.refresh_token.clone().unwrap_or_default(),
                // Lifetime unknown; treated as valid for this invocation.
                expires_at: Utc::now() + Duration::hours(1),
                workspace_id: String::new(),
            })));
        }
        if let Some(key) = self.env.api_key.as_deref() {
            return Ok(Some(Credential::api_key(key)));
        }
        if let Some(refresh_token) = self.env.refresh_token.as_deref() {
            info!("Exchanging LINEAR_REFRESH_TOKEN for an access token");
            let response = self.refresher.refresh(refresh_token).await?;
            let expires_in = expires_in_or_default(&response);
            return Ok(Some(Credential::OAuth(OAuthTokenPair {
                access_token: response.access_token,
                refresh_token: response
                    .refresh_token
                    .unwrap_or_else(|| refresh_token.to_string()),
                expires_at: Utc::now() + Duration::seconds(expires_in),
                workspace_id: String::new(),
            })));
        }
        Ok(None)
    }
}
