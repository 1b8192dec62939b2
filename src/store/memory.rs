use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::CredentialStore;
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey};

/// In-memory credential store, primarily for testing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CredentialKey, Credential>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `StoreUnavailable`, standing
    /// in for a host without a reachable secret service.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> AuthResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::StoreUnavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StoreUnavailable("memory store lock poisoned".into())
}

impl CredentialStore for MemoryStore {
    fn put(&self, key: &CredentialKey, credential: &Credential) -> AuthResult<()> {
        self.check_online()?;
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.clone(), credential.clone());
        Ok(())
    }

    fn get(&self, key: &CredentialKey) -> AuthResult<Credential> {
        self.check_online()?;
        self.entries
            .read()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(key.clone()))
    }

    fn delete(&self, key: &CredentialKey) -> AuthResult<()> {
        self.check_online()?;
        self.entries.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
