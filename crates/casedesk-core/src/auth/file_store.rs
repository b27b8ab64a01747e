use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tokens::{TokenPair, TokenStore, CREDENTIALS_KEY};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// On-disk record. `Sealed` holds the JSON-encoded pair encrypted with a
/// passphrase-derived key.
#[derive(Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
enum StoredRecord {
    Plain {
        tokens: TokenPair,
    },
    Sealed {
        salt: Vec<u8>,
        nonce: Vec<u8>,
        ciphertext: Vec<u8>,
    },
}

/// Token store backed by a JSON file, for hosts without a usable keychain.
///
/// Writes go through a temporary file and a rename so a crash never leaves
/// half a record behind. With a passphrase the pair is encrypted at rest.
pub struct FileTokenStore {
    path: PathBuf,
    passphrase: Option<String>,
}

impl FileTokenStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", CREDENTIALS_KEY)),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into()).filter(|p| !p.is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow::anyhow!("Failed to derive storage key: {}", e))?;
        Ok(key)
    }

    fn seal(passphrase: &str, tokens: &TokenPair) -> Result<StoredRecord> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = Self::derive_key(passphrase, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = serde_json::to_vec(tokens)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| anyhow::anyhow!("Failed to encrypt credentials"))?;

        Ok(StoredRecord::Sealed {
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    fn open(&self, salt: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<TokenPair> {
        let passphrase = self.passphrase.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Credentials file is encrypted but no passphrase was provided")
        })?;
        if nonce.len() != NONCE_LEN {
            anyhow::bail!("Credentials file has a malformed nonce");
        }

        let key = Self::derive_key(passphrase, salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow::anyhow!("Failed to decrypt credentials (wrong passphrase?)"))?;
        serde_json::from_slice(&plaintext).context("Failed to parse decrypted credentials")
    }
}

impl FileTokenStore {
    /// Write `contents` to `tmp` (owner-only from creation) and rename it over `dest`.
    fn write_replace(tmp: &Path, dest: &Path, contents: &[u8]) -> Result<()> {
        // A leftover temp file may carry looser permissions; start fresh
        if tmp.exists() {
            std::fs::remove_file(tmp).context("Failed to remove stale temp file")?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(tmp)
            .context("Failed to create credentials file")?;
        file.write_all(contents)
            .and_then(|_| file.sync_all())
            .context("Failed to write credentials file")?;
        drop(file);

        std::fs::rename(tmp, dest).context("Failed to replace credentials file")
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        let record: StoredRecord =
            serde_json::from_str(&contents).context("Failed to parse credentials file")?;

        match record {
            StoredRecord::Plain { tokens } => Ok(Some(tokens)),
            StoredRecord::Sealed {
                salt,
                nonce,
                ciphertext,
            } => self.open(&salt, &nonce, &ciphertext).map(Some),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        let record = match self.passphrase.as_deref() {
            Some(passphrase) => Self::seal(passphrase, tokens)?,
            None => StoredRecord::Plain {
                tokens: tokens.clone(),
            },
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&record)?;
        if let Err(e) = Self::write_replace(&tmp, &self.path, contents.as_bytes()) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        debug!(path = %self.path.display(), "Credentials written");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
        }
        Ok(())
    }
}
