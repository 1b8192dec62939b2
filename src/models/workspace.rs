use serde::{Deserialize, Serialize};

use crate::constants::EPHEMERAL_WORKSPACE_ID;

/// A Linear organization the CLI holds credentials for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceContext {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_key: Option<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

impl WorkspaceContext {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url_key: None,
            profiles: Vec::new(),
        }
    }

    /// Placeholder context for sessions whose credential came from a flag or
    /// the environment and no workspace was resolved.
    pub fn ephemeral() -> Self {
        Self::new(EPHEMERAL_WORKSPACE_ID, "environment")
    }

    pub fn is_ephemeral(&self) -> bool {
        self.id == EPHEMERAL_WORKSPACE_ID
    }

    /// Matches by id, display name or url key (names case-insensitively).
    pub fn matches(&self, needle: &str) -> bool {
        self.id == needle
            || self.name.eq_ignore_ascii_case(needle)
            || self
                .url_key
                .as_deref()
                .map(|k| k.eq_ignore_ascii_case(needle))
                .unwrap_or(false)
    }

    pub fn add_profile(&mut self, profile: &str) {
        if !self.profiles.iter().any(|p| p == profile) {
            self.profiles.push(profile.to_string());
        }
    }
}
