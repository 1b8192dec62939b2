//! Credential storage backends.
//!
//! Provides the [`CredentialStore`] trait and its implementations:
//! - [`NativeStore`] - the operating system's secret service via `keyring`
//! - [`EncryptedFileStore`] - XChaCha20-Poly1305 sealed file for hosts without one
//! - [`MemoryStore`] - in-process, for tests and throwaway sessions
//!
//! One backend is chosen per process by [`open_store`]; keys are never split
//! across backends.

mod encrypted_file;
mod memory;
mod native;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

pub use encrypted_file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use native::NativeStore;

use crate::config::{EnvOverrides, StoreBackendKind};
use crate::error::AuthResult;
use crate::models::{Credential, CredentialKey};

/// Durable storage for credentials keyed by (workspace id, profile).
///
/// Operations are not retried; a failing backend is reported to the caller.
pub trait CredentialStore: Send + Sync {
    /// Write `credential`, replacing whatever was stored for `key`.
    fn put(&self, key: &CredentialKey, credential: &Credential) -> AuthResult<()>;

    /// Fails with `NotFound` when nothing is stored for `key`.
    fn get(&self, key: &CredentialKey) -> AuthResult<Credential>;

    /// Remove the entry. Succeeds when it is already absent.
    fn delete(&self, key: &CredentialKey) -> AuthResult<()>;

    fn name(&self) -> &str;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn put(&self, key: &CredentialKey, credential: &Credential) -> AuthResult<()> {
        (**self).put(key, credential)
    }
    fn get(&self, key: &CredentialKey) -> AuthResult<Credential> {
        (**self).get(key)
    }
    fn delete(&self, key: &CredentialKey) -> AuthResult<()> {
        (**self).delete(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Select the backend for this process.
pub fn open_store(
    kind: StoreBackendKind,
    config_dir: &Path,
    env: &EnvOverrides,
) -> AuthResult<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match kind {
        StoreBackendKind::Keyring => {
            if !NativeStore::is_persistent() {
                warn!("System keyring on this platform does not survive a reboot");
            }
            Arc::new(NativeStore::new())
        }
        StoreBackendKind::EncryptedFile => {
            Arc::new(EncryptedFileStore::in_dir(config_dir, env.store_passphrase.clone()))
        }
        StoreBackendKind::Auto => {
            if NativeStore::is_persistent() && NativeStore::is_available() {
                Arc::new(NativeStore::new())
            } else {
                warn!("No persistent system keyring, using encrypted file store");
                Arc::new(EncryptedFileStore::in_dir(config_dir, env.store_passphrase.clone()))
            }
        }
    };
    info!(backend = store.name(), "Credential store selected");
    Ok(store)
}
