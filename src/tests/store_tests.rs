use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use super::oauth_pair;
use crate::config::{EnvOverrides, StoreBackendKind};
use crate::error::AuthError;
use crate::models::{Credential, CredentialKey};
use crate::store::{open_store, CredentialStore, EncryptedFileStore, MemoryStore};

fn stores(dir: &TempDir) -> Vec<Arc<dyn CredentialStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(EncryptedFileStore::in_dir(dir.path(), Some("correct horse".to_string()))),
    ]
}

#[test]
fn test_put_then_get_returns_same_credential() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let key = CredentialKey::new("org-acme", "default");
        let credential = oauth_pair("at-1", "rt-1", Duration::hours(1));

        store.put(&key, &credential).unwrap();
        assert_eq!(store.get(&key).unwrap(), credential, "backend {}", store.name());
    }
}

#[test]
fn test_put_replaces_existing_credential() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let key = CredentialKey::new("org-acme", "ci");
        store.put(&key, &oauth_pair("at-1", "rt-1", Duration::hours(1))).unwrap();
        store.put(&key, &Credential::api_key("lin_api_replacement_key")).unwrap();

        assert_eq!(
            store.get(&key).unwrap().as_api_key(),
            Some("lin_api_replacement_key")
        );
    }
}

#[test]
fn test_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let key = CredentialKey::new("org-acme", "default");
        store.put(&key, &Credential::api_key("lin_api_0123456789abcdef")).unwrap();

        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(matches!(store.get(&key), Err(AuthError::NotFound(_))));
    }
}

#[test]
fn test_profiles_are_isolated() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let default = CredentialKey::new("org-acme", "default");
        let ci = CredentialKey::new("org-acme", "ci");
        store.put(&default, &Credential::api_key("lin_api_default_profile")).unwrap();

        assert!(matches!(store.get(&ci), Err(AuthError::NotFound(_))));
        store.delete(&ci).unwrap();
        assert!(store.get(&default).is_ok());
    }
}

#[test]
fn test_offline_memory_store_reports_unavailable() {
    let store = MemoryStore::unavailable();
    let key = CredentialKey::new("org-acme", "default");

    assert!(matches!(
        store.put(&key, &Credential::api_key("lin_api_whatever_1234")),
        Err(AuthError::StoreUnavailable(_))
    ));
    assert!(matches!(store.get(&key), Err(AuthError::StoreUnavailable(_))));
    assert_eq!(
        AuthError::StoreUnavailable(String::new()).exit_code(),
        69
    );
}

#[test]
fn test_open_store_honors_encrypted_file_choice() {
    let dir = TempDir::new().unwrap();
    let env = EnvOverrides {
        store_passphrase: Some("secret".to_string()),
        ..EnvOverrides::default()
    };

    let store = open_store(StoreBackendKind::EncryptedFile, dir.path(), &env).unwrap();
    let key = CredentialKey::new("org-acme", "default");
    store.put(&key, &Credential::api_key("lin_api_encrypted_choice")).unwrap();

    assert_eq!(store.name(), "encrypted-file");
    assert!(dir.path().join(crate::constants::ENCRYPTED_STORE_FILE).exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_auto_prefers_encrypted_file_on_linux() {
    let dir = TempDir::new().unwrap();
    let env = EnvOverrides {
        store_passphrase: Some("secret".to_string()),
        ..EnvOverrides::default()
    };

    let store = open_store(StoreBackendKind::Auto, dir.path(), &env).unwrap();

    assert_eq!(store.name(), "encrypted-file");
}
