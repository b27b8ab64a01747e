use serde::{Deserialize, Serialize};

/// Role a user holds within an organization or office.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OrgAdmin,
    OfficeAdmin,
    Lawyer,
    Intern,
    Accountant,
    Finance,
    #[default]
    Guest,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Whether this role administers the organization or one of its offices
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::OrgAdmin | Role::OfficeAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OrgAdmin => "org_admin",
            Role::OfficeAdmin => "office_admin",
            Role::Lawyer => "lawyer",
            Role::Intern => "intern",
            Role::Accountant => "accountant",
            Role::Finance => "finance",
            Role::Guest => "guest",
            Role::Unknown => "unknown",
        }
    }
}

/// Association between the user and an organization (optionally scoped to one office).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Membership {
    pub id: i64,
    pub organization: i64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub office: Option<i64>,
    #[serde(default)]
    pub office_name: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub role: Role,
    #[serde(default)]
    pub role_display: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Membership {
    /// Human-readable scope, e.g. "Silva Advogados / Centro" or "Silva Advogados (all offices)"
    pub fn scope_display(&self) -> String {
        match self.office_name.as_deref() {
            Some(office) if !office.is_empty() => format!("{} / {}", self.organization_name, office),
            _ => format!("{} (all offices)", self.organization_name),
        }
    }

    /// Role label, preferring the server-provided display text
    pub fn role_label(&self) -> &str {
        if self.role_display.is_empty() {
            self.role.as_str()
        } else {
            &self.role_display
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_decodes_server_payload() {
        let json = r#"{
            "id": 3,
            "organization": 1,
            "organization_name": "Silva Advogados",
            "office": 4,
            "office_name": "Centro",
            "role": "lawyer",
            "role_display": "Advogado",
            "is_active": true
        }"#;
        let m: Membership = serde_json::from_str(json).unwrap();
        assert_eq!(m.role, Role::Lawyer);
        assert_eq!(m.scope_display(), "Silva Advogados / Centro");
        assert_eq!(m.role_label(), "Advogado");
    }

    #[test]
    fn test_unknown_role_does_not_fail_decoding() {
        let json = r#"{"id": 1, "organization": 1, "role": "paralegal"}"#;
        let m: Membership = serde_json::from_str(json).unwrap();
        assert_eq!(m.role, Role::Unknown);
        assert_eq!(m.role_label(), "unknown");
    }

    #[test]
    fn test_org_wide_membership_scope() {
        let json = r#"{"id": 1, "organization": 9, "organization_name": "Acme", "office": null, "role": "org_admin"}"#;
        let m: Membership = serde_json::from_str(json).unwrap();
        assert!(m.role.is_admin());
        assert_eq!(m.scope_display(), "Acme (all offices)");
    }
}
