//! Seams to the hosted backend.
//!
//! The gate never talks to the network itself. It sees the backend through two
//! traits: [`AuthProvider`] for session state and [`DataProvider`] for the
//! profile table. `patentdesk-web` implements both over REST; [`crate::memory`]
//! implements both in memory for tests and local runs.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use patentdesk_events::Subscription;

use crate::{Identity, SessionChange, SessionClaims};

/// A table row as returned by the backend.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A session recovered from whatever the backend client persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredSession {
    pub identity: Identity,

    /// Token validity window, when the provider knows it.
    pub claims: Option<SessionClaims>,
}

impl RestoredSession {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            claims: None,
        }
    }

    pub fn with_claims(identity: Identity, claims: SessionClaims) -> Self {
        Self {
            identity,
            claims: Some(claims),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthProviderError {
    #[error("auth backend unreachable: {0}")]
    Transport(String),

    #[error("auth backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed auth backend response: {0}")]
    Decode(String),

    #[error("invalid credentials")]
    InvalidCredentials,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataProviderError {
    #[error("data backend unreachable: {0}")]
    Transport(String),

    #[error("data backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed row from data backend: {0}")]
    Decode(String),

    #[error("expected at most one row in '{collection}', got {count}")]
    Ambiguous { collection: String, count: usize },
}

impl DataProviderError {
    /// Whether the failure says nothing about the data itself (backend unavailable).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { .. })
    }
}

/// Backend authentication service.
pub trait AuthProvider: Send + Sync {
    /// One-shot restore of the persisted session, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<RestoredSession>, AuthProviderError>> + Send;

    /// Register for pushed session changes (sign-in, sign-out, token refresh).
    fn on_session_change<F>(&self, callback: F) -> Subscription<SessionChange>
    where
        F: Fn(&SessionChange) + Send + Sync + 'static;
}

/// Backend row access, keyed by the row's `id` column.
pub trait DataProvider: Send + Sync {
    fn fetch_one(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Row>, DataProviderError>> + Send;
}

impl<A> AuthProvider for Arc<A>
where
    A: AuthProvider,
{
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<RestoredSession>, AuthProviderError>> + Send {
        (**self).current_session()
    }

    fn on_session_change<F>(&self, callback: F) -> Subscription<SessionChange>
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        (**self).on_session_change(callback)
    }
}

impl<D> DataProvider for Arc<D>
where
    D: DataProvider,
{
    fn fetch_one(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Row>, DataProviderError>> + Send {
        (**self).fetch_one(collection, key)
    }
}
