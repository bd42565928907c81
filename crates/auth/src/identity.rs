use serde::{Deserialize, Serialize};

use patentdesk_core::{DomainError, DomainResult, UserId};

/// Identity of an authenticated user, as reported by the auth backend.
///
/// Holds no authorization data. The role is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
}

impl Identity {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }

    /// Build an identity from raw backend fields.
    ///
    /// Accounts without an email (e.g. phone sign-in) are allowed; a present
    /// email must at least look like one.
    pub fn parse(id: &str, email: Option<&str>) -> DomainResult<Self> {
        let id: UserId = id.parse()?;
        let email = email.map(str::trim).unwrap_or_default();
        if !email.is_empty() && !email.contains('@') {
            return Err(DomainError::validation(format!("malformed email '{email}'")));
        }
        Ok(Self::new(id, email))
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} <{}>", self.id, self.email)
        }
    }
}
