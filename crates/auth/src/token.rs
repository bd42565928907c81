use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use patentdesk_core::UserId;

/// Validity window of a backend-issued session token.
///
/// Signature verification is the backend's job; these are the claims the
/// client needs to decide whether a persisted session is still usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject the token was issued to.
    pub sub: UserId,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("session token has expired")]
    Expired,

    #[error("session token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("session token subject {claimed} does not match user {actual}")]
    SubjectMismatch { claimed: UserId, actual: UserId },
}

/// Deterministically validate session claims for `user` at `now`.
pub fn validate_claims(
    claims: &SessionClaims,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.sub != user {
        return Err(TokenValidationError::SubjectMismatch {
            claimed: claims.sub,
            actual: user,
        });
    }
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
