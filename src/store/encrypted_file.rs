//! Encrypted file fallback for hosts without a secret service.
//!
//! All credentials live in one JSON file. Each entry is sealed with
//! XChaCha20-Poly1305 under a key derived by Argon2id from a master secret and
//! the file's salt; the entry's account name is bound in as associated data so
//! sealed blobs cannot be swapped between keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::CredentialStore;
use crate::config::config::write_private;
use crate::constants::{ENCRYPTED_STORE_FILE, STORE_KEY_FILE};
use crate::auth_error;
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, CredentialKey};

const FORMAT_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    salt: String,
    #[serde(default)]
    entries: BTreeMap<String, SealedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEntry {
    nonce: String,
    ciphertext: String,
}

/// Where the master secret comes from.
#[derive(Debug, Clone)]
enum MasterSecret {
    Passphrase(String),
    /// Random key generated on first use, readable by the owner only.
    KeyFile(PathBuf),
}

pub struct EncryptedFileStore {
    path: PathBuf,
    secret: MasterSecret,
    /// Last derived key, tagged with the salt it was derived for.
    derived: Mutex<Option<(String, [u8; KEY_LEN])>>,
    /// Serializes read-modify-write cycles inside this process.
    write_lock: Mutex<()>,
}

impl EncryptedFileStore {
    /// Store in `dir`, keyed by `passphrase` when given, otherwise by a
    /// generated key file next to the store.
    pub fn in_dir(dir: &Path, passphrase: Option<String>) -> Self {
        let secret = match passphrase {
            Some(p) => MasterSecret::Passphrase(p),
            None => MasterSecret::KeyFile(dir.join(STORE_KEY_FILE)),
        };
        Self {
            path: dir.join(ENCRYPTED_STORE_FILE),
            secret,
            derived: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn master_secret(&self, create: bool) -> AuthResult<Vec<u8>> {
        match &self.secret {
            MasterSecret::Passphrase(p) => Ok(p.as_bytes().to_vec()),
            MasterSecret::KeyFile(path) => {
                if path.exists() {
                    let encoded = fs::read_to_string(path)?;
                    return STANDARD.decode(encoded.trim()).map_err(|e| {
                        AuthError::StoreUnavailable(format!(
                            "store key {} is corrupt: {}",
                            path.display(),
                            e
                        ))
                    });
                }
                if !create {
                    return Err(AuthError::StoreUnavailable(format!(
                        "store key {} is missing",
                        path.display()
                    )));
                }
                let mut key = vec![0u8; KEY_LEN];
                rand::thread_rng().fill_bytes(&mut key);
                write_private(path, STANDARD.encode(&key).as_bytes())?;
                info!(path = %path.display(), "Generated credential store key");
                Ok(key)
            }
        }
    }

    fn cipher(&self, salt: &str, create_secret: bool) -> AuthResult<XChaCha20Poly1305> {
        let mut derived = self
            .derived
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("key cache lock poisoned".into()))?;

        let key = match derived.as_ref() {
            Some((cached_salt, key)) if cached_salt == salt => *key,
            _ => {
                let salt_bytes = STANDARD
                    .decode(salt)
                    .map_err(|e| AuthError::StoreUnavailable(format!("corrupt salt: {}", e)))?;
                let secret = self.master_secret(create_secret)?;
                let key = derive_key(&secret, &salt_bytes)?;
                *derived = Some((salt.to_string(), key));
                key
            }
        };

        XChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| auth_error!(Internal, "cipher init: {}", e))
    }

    fn read_vault(&self) -> AuthResult<Option<VaultFile>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let vault: VaultFile = serde_json::from_str(&content).map_err(|e| {
            AuthError::StoreUnavailable(format!("{} is corrupt: {}", self.path.display(), e))
        })?;
        if vault.version != FORMAT_VERSION {
            return Err(AuthError::StoreUnavailable(format!(
                "unsupported store format version {}",
                vault.version
            )));
        }
        Ok(Some(vault))
    }

    fn write_vault(&self, vault: &VaultFile) -> AuthResult<()> {
        let content = serde_json::to_string_pretty(vault)?;
        write_private(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), entries = vault.entries.len(), "Encrypted store written");
        Ok(())
    }

    fn new_vault() -> VaultFile {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        VaultFile {
            version: FORMAT_VERSION,
            salt: STANDARD.encode(salt),
            entries: BTreeMap::new(),
        }
    }
}

fn derive_key(secret: &[u8], salt: &[u8]) -> AuthResult<[u8; KEY_LEN]> {
    let params = Params::new(Params::DEFAULT_M_COST, Params::DEFAULT_T_COST, 1, Some(KEY_LEN))
        .map_err(|e| auth_error!(Internal, "argon2 params: {}", e))?;
    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| auth_error!(Internal, "key derivation failed: {}", e))?;
    Ok(key)
}

fn open_entry(
    cipher: &XChaCha20Poly1305,
    account: &str,
    sealed: &SealedEntry,
) -> AuthResult<Vec<u8>> {
    let nonce = STANDARD
        .decode(&sealed.nonce)
        .map_err(|e| AuthError::StoreUnavailable(format!("corrupt nonce: {}", e)))?;
    if nonce.len() != NONCE_LEN {
        return Err(AuthError::StoreUnavailable("corrupt nonce length".into()));
    }
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| AuthError::StoreUnavailable(format!("corrupt ciphertext: {}", e)))?;

    cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: account.as_bytes(),
            },
        )
        .map_err(|_| {
            AuthError::StoreUnavailable(
                "could not decrypt credential store (wrong LINEAR_STORE_PASSPHRASE?)".into(),
            )
        })
}

impl CredentialStore for EncryptedFileStore {
    #[instrument(skip(self, credential))]
    fn put(&self, key: &CredentialKey, credential: &Credential) -> AuthResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("store lock poisoned".into()))?;

        let mut vault = self.read_vault()?.unwrap_or_else(Self::new_vault);
        let cipher = self.cipher(&vault.salt, true)?;
        // Entries sealed under another key would become unreadable.
        if let Some((existing, sealed)) = vault.entries.iter().next() {
            open_entry(&cipher, existing, sealed)?;
        }

        let account = key.account();
        let plaintext = serde_json::to_vec(credential)?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: account.as_bytes(),
                },
            )
            .map_err(|_| AuthError::Internal("encryption failed".into()))?;

        vault.entries.insert(
            account,
            SealedEntry {
                nonce: STANDARD.encode(nonce),
                ciphertext: STANDARD.encode(ciphertext),
            },
        );
        self.write_vault(&vault)
    }

    #[instrument(skip(self))]
    fn get(&self, key: &CredentialKey) -> AuthResult<Credential> {
        let vault = self
            .read_vault()?
            .ok_or_else(|| AuthError::NotFound(key.clone()))?;
        let account = key.account();
        let sealed = vault
            .entries
            .get(&account)
            .ok_or_else(|| AuthError::NotFound(key.clone()))?;

        let cipher = self.cipher(&vault.salt, false)?;
        let plaintext = open_entry(&cipher, &account, sealed)?;

        serde_json::from_slice(&plaintext).map_err(|e| {
            AuthError::InvalidCredential(format!("stored credential is malformed: {}", e))
        })
    }

    #[instrument(skip(self))]
    fn delete(&self, key: &CredentialKey) -> AuthResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("store lock poisoned".into()))?;

        let Some(mut vault) = self.read_vault()? else {
            return Ok(());
        };
        if vault.entries.remove(&key.account()).is_some() {
            self.write_vault(&vault)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "encrypted-file"
    }
}
