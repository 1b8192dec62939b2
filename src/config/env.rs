use std::collections::HashMap;

use crate::constants::{
    ENV_ACCESS_TOKEN, ENV_API_KEY, ENV_API_URL, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_CONFIG_DIR,
    ENV_PROFILE,
    ENV_REFRESH_TOKEN, ENV_STORE_PASSPHRASE, ENV_WORKSPACE,
};

/// Environment variables that influence authentication for one invocation.
///
/// Captured once at startup and passed around explicitly. Nothing read from
/// here is ever persisted.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_url: Option<String>,
    pub workspace: Option<String>,
    pub profile: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub store_passphrase: Option<String>,
    pub config_dir: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Build from an arbitrary lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            api_key: get(ENV_API_KEY),
            access_token: get(ENV_ACCESS_TOKEN),
            refresh_token: get(ENV_REFRESH_TOKEN),
            api_url: get(ENV_API_URL),
            workspace: get(ENV_WORKSPACE),
            profile: get(ENV_PROFILE),
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            store_passphrase: get(ENV_STORE_PASSPHRASE),
            config_dir: get(ENV_CONFIG_DIR),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some() || self.access_token.is_some() || self.refresh_token.is_some()
    }
}
