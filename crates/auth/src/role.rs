use serde::{Deserialize, Serialize};

use crate::Row;

/// Authorization attribute of an identity.
///
/// Only the backend's profile row decides this value. Anything other than an
/// exact `"admin"` maps to `Standard`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Admin,
}

impl Role {
    pub const PROFILE_FIELD: &'static str = "role";

    pub fn from_profile_value(value: &str) -> Self {
        if value == "admin" {
            Self::Admin
        } else {
            Self::Standard
        }
    }

    /// Read the role column of a profile row. A missing or non-string value is `Standard`.
    pub fn from_profile_row(row: &Row) -> Self {
        row.get(Self::PROFILE_FIELD)
            .and_then(serde_json::Value::as_str)
            .map(Self::from_profile_value)
            .unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role as seen by a gate: possibly still being fetched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RoleState {
    #[default]
    Unresolved,
    Resolved(Role),
}

impl RoleState {
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Unresolved => None,
            Self::Resolved(role) => Some(*role),
        }
    }
}

impl From<Role> for RoleState {
    fn from(role: Role) -> Self {
        Self::Resolved(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn only_exact_admin_is_admin() {
        assert_eq!(Role::from_profile_row(&row(json!({"role": "admin"}))), Role::Admin);
        assert_eq!(Role::from_profile_row(&row(json!({"role": "Admin"}))), Role::Standard);
        assert_eq!(Role::from_profile_row(&row(json!({"role": "administrator"}))), Role::Standard);
        assert_eq!(Role::from_profile_row(&row(json!({"role": "user"}))), Role::Standard);
    }

    #[test]
    fn missing_or_non_string_role_is_standard() {
        assert_eq!(Role::from_profile_row(&row(json!({"id": "x"}))), Role::Standard);
        assert_eq!(Role::from_profile_row(&row(json!({"role": null}))), Role::Standard);
        assert_eq!(Role::from_profile_row(&row(json!({"role": true}))), Role::Standard);
    }
}
