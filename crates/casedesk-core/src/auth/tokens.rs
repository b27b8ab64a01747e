use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RefreshResponse;
use crate::utils::{age_display, mask_token};

/// Storage key under which the credential pair is kept.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Access and refresh token issued together by the authority.
///
/// Always persisted as one record so the two tokens cannot drift apart.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub issued_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
            issued_at: Utc::now(),
        }
    }

    /// The pair after a refresh. Keeps the current refresh token unless the server rotated it.
    pub fn refreshed(&self, response: RefreshResponse) -> Self {
        Self::new(
            response.access,
            response.refresh.unwrap_or_else(|| self.refresh.clone()),
        )
    }

    pub fn age_display(&self) -> String {
        age_display(self.issued_at)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &mask_token(&self.access))
            .field("refresh", &mask_token(&self.refresh))
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Durable storage for the credential pair.
///
/// `save` and `clear` replace or remove the whole pair in one operation.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>>;
    fn save(&self, tokens: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Token store that lives only as long as the process.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<TokenPair>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tokens))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<TokenPair>>> {
        self.slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, tokens: &TokenPair) -> Result<()> {
        *self.lock()? = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refreshed_keeps_refresh_without_rotation() {
        let pair = TokenPair::new("A", "R");
        let next = pair.refreshed(RefreshResponse {
            access: "A2".to_string(),
            refresh: None,
        });
        assert_eq!(next.access, "A2");
        assert_eq!(next.refresh, "R");
    }

    #[test]
    fn test_refreshed_takes_rotated_refresh() {
        let pair = TokenPair::new("A", "R");
        let next = pair.refreshed(RefreshResponse {
            access: "A2".to_string(),
            refresh: Some("R2".to_string()),
        });
        assert_eq!(next.refresh, "R2");
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let pair = TokenPair::new("secret-access-token-1234", "secret-refresh-token-9876");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret-access"));
        assert!(debug.contains("...1234"));
    }

    #[test]
    fn test_memory_store_clones_share_slot() {
        let store = MemoryTokenStore::new();
        let observer = store.clone();
        store.save(&TokenPair::new("A", "R")).unwrap();
        assert_eq!(observer.load().unwrap().unwrap().access, "A");
        store.clear().unwrap();
        assert!(observer.load().unwrap().is_none());
    }
}
