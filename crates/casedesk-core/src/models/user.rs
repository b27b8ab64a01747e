use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of the authenticated account as returned by `/auth/login/` and `/auth/me/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub date_joined: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Name to show in the UI: full name, else first name, else email.
    pub fn display_name(&self) -> &str {
        let full = self.full_name.trim();
        if !full.is_empty() {
            return full;
        }
        let composed = self.first_name.trim();
        if !composed.is_empty() {
            return composed;
        }
        &self.email
    }
}
