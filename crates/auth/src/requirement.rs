use serde::{Deserialize, Serialize};

/// What a route demands of the visitor before its page may render.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationRequirement {
    Public,
    RequiresSession,
    RequiresAdmin,
}

impl AuthorizationRequirement {
    pub const ALL: [Self; 3] = [Self::Public, Self::RequiresSession, Self::RequiresAdmin];

    pub fn needs_role(&self) -> bool {
        matches!(self, Self::RequiresAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::RequiresSession => "requires_session",
            Self::RequiresAdmin => "requires_admin",
        }
    }
}

impl core::fmt::Display for AuthorizationRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
