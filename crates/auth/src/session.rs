//! Session states and the change notifications pushed by the auth backend.

use serde::{Deserialize, Serialize};

use crate::Identity;

/// Resolved authentication state of the current visitor.
///
/// `Unknown` is the initial state only. It is left exactly once per store
/// lifetime (or per explicit re-initialization).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Unknown,
    Anonymous,
    Authenticated(Identity),
}

impl Session {
    pub fn from_identity(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => Self::Authenticated(identity),
            None => Self::Anonymous,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Short label for structured logs (never includes the email).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Anonymous => "anonymous",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// What happened on the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionChangeKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A pushed session change: the event kind plus the identity now signed in, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChange {
    pub kind: SessionChangeKind,
    pub identity: Option<Identity>,
}

impl SessionChange {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            kind: SessionChangeKind::SignedIn,
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: SessionChangeKind::SignedOut,
            identity: None,
        }
    }

    pub fn token_refreshed(identity: Identity) -> Self {
        Self {
            kind: SessionChangeKind::TokenRefreshed,
            identity: Some(identity),
        }
    }

    /// The session this change leads to.
    ///
    /// A sign-out always yields `Anonymous`, even if a backend mistakenly
    /// attaches an identity to it.
    pub fn session(&self) -> Session {
        match self.kind {
            SessionChangeKind::SignedOut => Session::Anonymous,
            _ => Session::from_identity(self.identity.clone()),
        }
    }
}
