use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::APP_NAME;

use super::tokens::{TokenPair, TokenStore, CREDENTIALS_KEY};

/// Token store backed by the OS keychain.
///
/// The pair is serialized to JSON and kept in a single keychain entry.
/// A write only succeeds once the entry reads back with the same value.
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(APP_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, CREDENTIALS_KEY).context("Failed to create keyring entry")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let tokens = serde_json::from_str(&secret)
                    .context("Failed to parse credentials from keychain")?;
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credentials from keychain"),
        }
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        let secret = serde_json::to_string(tokens)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store credentials in keychain")?;

        // Some backends accept a write and keep nothing; read it back through a fresh entry
        match self.entry()?.get_password() {
            Ok(stored) if stored == secret => {}
            Ok(_) | Err(keyring::Error::NoEntry) => {
                anyhow::bail!("Keychain did not retain credentials for {}", self.service)
            }
            Err(e) => return Err(e).context("Failed to verify credentials in keychain"),
        }
        debug!(service = %self.service, "Credentials stored in keychain");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credentials from keychain"),
        }
    }
}
