use serde::{Deserialize, Serialize};

use super::{Membership, User};

/// The authenticated user together with their active memberships.
///
/// This is also the exact shape of the `/auth/me/` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Identity {
    pub user: User,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl Identity {
    /// Memberships that are currently active, in server order
    pub fn active_memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.iter().filter(|m| m.is_active)
    }
}

/// Response body of `POST /auth/login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl LoginResponse {
    /// Split the response into its identity and raw token strings
    pub fn into_parts(self) -> (Identity, String, String) {
        let identity = Identity {
            user: self.user,
            memberships: self.memberships,
        };
        (identity, self.access, self.refresh)
    }
}

/// Response body of `POST /auth/refresh/`.
///
/// `refresh` is only present when the authority rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
