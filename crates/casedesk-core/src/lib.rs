//! Core library for casedesk.
//!
//! Session lifecycle for the back-office client: the HTTP gateway to the
//! `/auth/*` endpoints, the session store that owns the signed-in identity,
//! and durable storage for the credential pair.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;

use crate::api::HttpAuthGateway;
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionStore, TokenStore};
use crate::config::{Config, TokenStoreKind};

/// Environment variable holding the passphrase for the encrypted file store
pub const ENV_STORE_PASSPHRASE: &str = "CASEDESK_STORE_PASSPHRASE";

/// Build the token store selected in the config.
pub fn token_store_from_config(config: &Config) -> Result<Box<dyn TokenStore>> {
    let store: Box<dyn TokenStore> = match config.token_store {
        TokenStoreKind::Keyring => Box::new(KeyringTokenStore::default()),
        TokenStoreKind::File => {
            let mut store = FileTokenStore::new(&config.data_dir()?);
            if let Ok(passphrase) = std::env::var(ENV_STORE_PASSPHRASE) {
                store = store.with_passphrase(passphrase);
            }
            Box::new(store)
        }
        TokenStoreKind::Memory => Box::new(MemoryTokenStore::new()),
    };
    Ok(store)
}

/// Build a session store wired to the configured API and token store.
/// The returned store is still `Loading`; call `init` to restore the session.
pub fn session_from_config(config: &Config) -> Result<SessionStore> {
    let gateway = Arc::new(HttpAuthGateway::from_config(config)?);
    let tokens = token_store_from_config(config)?;
    Ok(SessionStore::new(gateway, tokens))
}
