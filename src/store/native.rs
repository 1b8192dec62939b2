use ::keyring::Entry;
use tracing::instrument;

use super::CredentialStore;
use crate::constants::KEYRING_SERVICE;
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey};

/// Credentials in the platform secret service (Keychain, Credential Manager,
/// kernel keyutils). Each key is one entry holding the credential as JSON.
#[derive(Debug, Clone)]
pub struct NativeStore {
    service: String,
}

impl Default for NativeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    /// Whether entries outlive a reboot. On Linux the backend is the kernel
    /// keyutils keyring, which is cleared when the machine restarts.
    pub fn is_persistent() -> bool {
        !cfg!(target_os = "linux")
    }

    /// Probe whether a secret service answers at all.
    pub fn is_available() -> bool {
        match Entry::new(KEYRING_SERVICE, "availability-check") {
            Ok(entry) => match entry.get_password() {
                Ok(_) | Err(::keyring::Error::NoEntry) => true,
                Err(::keyring::Error::NoStorageAccess(_))
                | Err(::keyring::Error::PlatformFailure(_)) => false,
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    fn entry(&self, key: &CredentialKey) -> AuthResult<Entry> {
        Entry::new(&self.service, &key.account()).map_err(map_keyring_error)
    }
}

fn map_keyring_error(e: ::keyring::Error) -> AuthError {
    match e {
        ::keyring::Error::NoStorageAccess(inner) => {
            AuthError::StoreUnavailable(format!("no access to keyring: {}", inner))
        }
        ::keyring::Error::PlatformFailure(inner) => {
            AuthError::StoreUnavailable(format!("keyring failure: {}", inner))
        }
        other => AuthError::StoreUnavailable(format!("keyring error: {}", other)),
    }
}

impl CredentialStore for NativeStore {
    #[instrument(skip(self, credential))]
    fn put(&self, key: &CredentialKey, credential: &Credential) -> AuthResult<()> {
        let json = serde_json::to_string(credential)?;
        self.entry(key)?
            .set_password(&json)
            .map_err(map_keyring_error)
    }

    #[instrument(skip(self))]
    fn get(&self, key: &CredentialKey) -> AuthResult<Credential> {
        match self.entry(key)?.get_password() {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                AuthError::InvalidCredential(format!("stored credential is malformed: {}", e))
            }),
            Err(::keyring::Error::NoEntry) => Err(AuthError::NotFound(key.clone())),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    #[instrument(skip(self))]
    fn delete(&self, key: &CredentialKey) -> AuthResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
