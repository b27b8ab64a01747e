//! Authentication module for managing the signed-in session and its credentials.
//!
//! This module provides:
//! - `SessionStore`: Session lifecycle (restore, login, logout, refresh)
//! - `TokenStore`: Durable storage for the access/refresh token pair
//! - `KeyringTokenStore`, `FileTokenStore`, `MemoryTokenStore`: its backends
//!
//! The token pair is always written and removed as a single record.

pub mod credentials;
pub mod file_store;
pub mod session;
pub mod tokens;

pub use credentials::KeyringTokenStore;
pub use file_store::FileTokenStore;
pub use session::{
    HydrationPolicy, LoginOutcome, SessionError, SessionSnapshot, SessionState, SessionStore,
    SharedSession,
};
pub use tokens::{MemoryTokenStore, TokenPair, TokenStore, CREDENTIALS_KEY};
