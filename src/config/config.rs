use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    APP_NAME, CONFIG_FILE, DEFAULT_REDIRECT_URI, DEFAULT_REFRESH_MARGIN_SECS, DEFAULT_SCOPES,
    DEFAULT_TIMEOUT_SECS,
};
use super::env::EnvOverrides;
use crate::error::{AuthError, AuthResult};
use crate::models::WorkspaceContext;

/// Which secret backend holds credentials for this installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackendKind {
    #[default]
    Auto,
    Keyring,
    EncryptedFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
}

impl OAuthSettings {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn scopes(&self) -> &str {
        self.scopes.as_deref().unwrap_or(DEFAULT_SCOPES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Plaintext API key, written only when `allow_plaintext_fallback` is set
    /// and the secret store is unavailable. OAuth tokens never land here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Id of the workspace used when no flag or environment variable names one.
    pub default_workspace: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub credential_store: StoreBackendKind,
    #[serde(default)]
    pub allow_plaintext_fallback: bool,
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: i64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_refresh_margin() -> i64 {
    DEFAULT_REFRESH_MARGIN_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            default_workspace: None,
            workspaces: Vec::new(),
            api_url: None,
            oauth: OAuthSettings::default(),
            credential_store: StoreBackendKind::default(),
            allow_plaintext_fallback: false,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// `refresh_margin_secs` as a duration; negative values count as zero.
    pub fn refresh_margin(&self) -> AuthResult<chrono::Duration> {
        chrono::Duration::try_seconds(self.refresh_margin_secs.max(0)).ok_or_else(|| {
            AuthError::Config(format!(
                "refresh_margin_secs {} is out of range",
                self.refresh_margin_secs
            ))
        })
    }

    pub fn find_workspace(&self, needle: &str) -> Option<&WorkspaceContext> {
        self.workspaces.iter().find(|w| w.matches(needle))
    }

    pub fn default_workspace(&self) -> Option<&WorkspaceContext> {
        let id = self.default_workspace.as_deref()?;
        self.workspaces.iter().find(|w| w.id == id)
    }

    /// Insert or replace the workspace with the same id, keeping known profiles.
    pub fn upsert_workspace(&mut self, mut workspace: WorkspaceContext, profile: &str) {
        workspace.add_profile(profile);
        match self.workspaces.iter_mut().find(|w| w.id == workspace.id) {
            Some(existing) => {
                for p in &existing.profiles {
                    workspace.add_profile(p);
                }
                *existing = workspace;
            }
            None => self.workspaces.push(workspace),
        }
    }
}

/// Directory holding `config.json` and the encrypted store: the explicit
/// override, then `LINEAR_CONFIG_DIR`, then the platform config directory.
pub fn config_dir(override_dir: Option<&Path>, env: &EnvOverrides) -> AuthResult<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env.config_dir.as_deref() {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .ok_or_else(|| AuthError::Config("Could not find config directory".to_string()))
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

pub fn load_config(path: &Path) -> AuthResult<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let config_str = fs::read_to_string(path)?;
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_json::from_str(&config_str)
        .map_err(|e| AuthError::Config(format!("{}: {}", path.display(), e)))
}

pub fn save_config(path: &Path, config: &Config) -> AuthResult<()> {
    let config_str = serde_json::to_string_pretty(config)?;
    write_private(path, config_str.as_bytes())?;
    debug!(path = %path.display(), "Config saved");
    Ok(())
}

/// Replace `path` atomically with owner-only permissions.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> AuthResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| AuthError::Config(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| AuthError::Io(e.error))?;
    Ok(())
}
