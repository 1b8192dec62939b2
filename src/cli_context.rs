use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{
    AuthFacade, CredentialSource, OAuthClient, OAuthEndpoints, Session, SessionRequest,
    TokenManager, TokenRefresher,
};
use crate::client::LinearClient;
use crate::config::{config_dir, config_path, load_config, save_config, Config, EnvOverrides};
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey, Viewer};
use crate::store::{open_store, CredentialStore};

/// Central context for one CLI invocation: configuration, credential store,
/// token manager and OAuth client, threaded explicitly into every command.
pub struct CliContext {
    config_dir: PathBuf,
    config_path: PathBuf,
    facade: AuthFacade,
    oauth: Arc<OAuthClient>,
}

impl CliContext {
    /// Load context from the default locations and the process environment.
    pub fn load(config_dir: Option<&Path>, profile: Option<String>) -> AuthResult<Self> {
        let mut builder = CliContextBuilder::new().with_env(EnvOverrides::from_env());
        if let Some(dir) = config_dir {
            builder = builder.with_config_dir(dir);
        }
        if let Some(profile) = profile {
            builder = builder.with_profile(profile);
        }
        builder.build()
    }

    pub fn facade(&self) -> &AuthFacade {
        &self.facade
    }

    pub fn config(&self) -> &Config {
        self.facade.config()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn profile(&self) -> &str {
        self.facade.profile()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        self.facade.tokens().store()
    }

    pub fn tokens(&self) -> &TokenManager {
        self.facade.tokens()
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// GraphQL endpoint: `LINEAR_API_URL`, then the config file.
    pub fn api_url(&self) -> Option<String> {
        self.facade
            .env()
            .api_url
            .clone()
            .or_else(|| self.config().api_url.clone())
    }

    pub fn timeout_secs(&self) -> u64 {
        self.config().timeout_secs
    }

    pub async fn session(&self, request: &SessionRequest) -> AuthResult<Session> {
        self.facade.session(request).await
    }

    pub fn client_for(&self, credential: &Credential) -> AuthResult<LinearClient> {
        LinearClient::new(credential, self.api_url().as_deref(), self.timeout_secs())
    }

    /// Fetch the viewer with the session's credential. When the API rejects a
    /// stored OAuth token before its recorded expiry, the pair is refreshed
    /// once and the query retried with the new token.
    pub async fn viewer(&self, session: &mut Session) -> AuthResult<Viewer> {
        match self.client_for(&session.credential)?.get_viewer().await {
            Err(AuthError::InvalidCredential(reason))
                if session.source == CredentialSource::Store
                    && session.credential.as_oauth().is_some() =>
            {
                info!(key = %session.key(), "Access token rejected ({}), refreshing", reason);
                session.credential = self.tokens().force_refresh(&session.key()).await?;
                self.client_for(&session.credential)?.get_viewer().await
            }
            other => other,
        }
    }

    /// Apply `f` to the configuration and write it back.
    pub fn update_config<F>(&mut self, f: F) -> AuthResult<()>
    where
        F: FnOnce(&mut Config),
    {
        f(self.facade.config_mut());
        save_config(&self.config_path, self.facade.config())
    }

    /// Persist a credential in the store. API keys fall back to the config
    /// file when the store is unreachable and the user opted in.
    pub fn store_credential(
        &mut self,
        key: &CredentialKey,
        credential: &Credential,
    ) -> AuthResult<CredentialSource> {
        match self.store().put(key, credential) {
            Ok(()) => Ok(CredentialSource::Store),
            Err(AuthError::StoreUnavailable(reason)) => match credential {
                Credential::ApiKey { key: api_key } if self.config().allow_plaintext_fallback => {
                    warn!("Credential store unavailable ({}); writing API key to config file", reason);
                    let api_key = api_key.clone();
                    self.update_config(|c| c.api_key = Some(api_key))?;
                    Ok(CredentialSource::ConfigFile)
                }
                _ => Err(AuthError::StoreUnavailable(reason)),
            },
            Err(e) => Err(e),
        }
    }
}

/// Builder for creating CLI contexts with specific configurations
pub struct CliContextBuilder {
    config_dir: Option<PathBuf>,
    env: EnvOverrides,
    profile: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    endpoints: Option<OAuthEndpoints>,
}

impl CliContextBuilder {
    pub fn new() -> Self {
        Self {
            config_dir: None,
            env: EnvOverrides::default(),
            profile: None,
            store: None,
            refresher: None,
            endpoints: None,
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Use this store instead of the configured backend.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this refresher instead of the OAuth client.
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_oauth_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn build(self) -> AuthResult<CliContext> {
        let config_dir = config_dir(self.config_dir.as_deref(), &self.env)?;
        let config_path = config_path(&config_dir);
        let config = load_config(&config_path)?;

        let mut oauth = OAuthClient::new(&config.oauth, &self.env, config.timeout_secs)?;
        if let Some(endpoints) = self.endpoints {
            oauth = oauth.with_endpoints(endpoints);
        }
        let oauth = Arc::new(oauth);

        let store = match self.store {
            Some(store) => store,
            None => open_store(config.credential_store, &config_dir, &self.env)?,
        };
        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => oauth.clone(),
        };

        let margin = config.refresh_margin()?;
        let tokens = TokenManager::new(store, refresher.clone(), margin);
        let facade = AuthFacade::new(config, self.env, self.profile, tokens, refresher);

        Ok(CliContext {
            config_dir,
            config_path,
            facade,
            oauth,
        })
    }
}

impl Default for CliContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
