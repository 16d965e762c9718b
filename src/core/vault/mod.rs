use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::Engine;
use hmac::Mac;
use rusqlite::Connection;
use sha2::Sha256;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::error::VaultError;

type HmacSha256 = hmac::Hmac<Sha256>;

/// Storage slot for the one credential punter manages.
const API_KEY_SLOT: &str = "api_key";

/// Abstract credential storage, injected into the agent client so tests can
/// substitute an in-memory database for the on-disk vault.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Overwrite any existing credential. Accepts any string; non-empty is
    /// a CLI-layer convention, not a store invariant.
    async fn set(&self, value: &str) -> Result<(), VaultError>;

    /// The stored credential, or `None` if nothing is saved. Absence is
    /// not an error.
    async fn get(&self) -> Result<Option<String>, VaultError>;

    /// Remove the credential; subsequent `get` returns `None`.
    async fn clear(&self) -> Result<(), VaultError>;

    async fn has(&self) -> Result<bool, VaultError> {
        Ok(self.get().await?.is_some())
    }
}

/// Encrypted credential storage over a local SQLite database.
///
/// Values are AES-256-GCM encrypted with a key derived from
/// machine-specific identifiers, so the database file is useless when
/// copied to another machine but survives restarts on this one.
pub struct CredentialVault {
    db: Mutex<Connection>,
    cipher: Aes256Gcm,
}

/// Derive a 256-bit encryption key from machine-specific identifiers.
/// Uses HMAC-SHA256(hostname + username, "punter-vault-v1") so the key is
/// stable across restarts but tied to the local machine/user.
fn derive_key() -> [u8; 32] {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = whoami::username();
    let input = format!("{}{}", hostname, username);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(b"punter-vault-v1")
        .expect("HMAC can take key of any size");
    mac.update(input.as_bytes());
    let result = mac.finalize();
    let bytes = result.into_bytes();

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    key
}

impl CredentialVault {
    /// Open (or create) the vault database at `path` and ensure its schema.
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        let db = Connection::open(path)?;
        crate::core::config::restrict_file_permissions(path);
        let vault = Self::with_connection(db)?;
        debug!("opened credential vault at {}", path.display());
        Ok(vault)
    }

    /// Vault over an in-memory database. Nothing persists; test use only.
    pub fn in_memory() -> Result<Self, VaultError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self, VaultError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS credentials (
                slot TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        let key = derive_key();
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key is valid for AES-256");
        Ok(Self {
            db: Mutex::new(db),
            cipher,
        })
    }

    /// Encrypt a plaintext value. Returns base64(nonce || ciphertext).
    fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Crypto(format!("encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(12 + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt a base64(nonce || ciphertext) value. Returns plaintext.
    fn decrypt(&self, encoded: &str) -> Result<String, VaultError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| VaultError::Crypto(format!("base64 decode failed: {}", e)))?;

        if combined.len() < 13 {
            return Err(VaultError::Crypto("encrypted value too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| VaultError::Crypto(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| VaultError::Crypto(format!("UTF-8 decode failed: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for CredentialVault {
    async fn set(&self, value: &str) -> Result<(), VaultError> {
        let encrypted = self.encrypt(value)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO credentials (slot, value) VALUES (?1, ?2)
             ON CONFLICT(slot) DO UPDATE SET value=excluded.value",
            (API_KEY_SLOT, &encrypted),
        )?;
        Ok(())
    }

    async fn get(&self) -> Result<Option<String>, VaultError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT value FROM credentials WHERE slot = ?1")?;
        let mut rows = stmt.query([API_KEY_SLOT])?;

        if let Some(row) = rows.next()? {
            let stored: String = row.get(0)?;
            Ok(Some(self.decrypt(&stored)?))
        } else {
            Ok(None)
        }
    }

    async fn clear(&self) -> Result<(), VaultError> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM credentials WHERE slot = ?1", [API_KEY_SLOT])?;
        Ok(())
    }
}
