//! REST adapters for the hosted auth/data backend.
//!
//! Both providers share one [`BackendClient`], so the access token obtained by
//! signing in is the one row lookups are made with.

mod auth;
mod data;

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;

use patentdesk_auth::Identity;

use crate::config::BackendConfig;

pub use auth::RestAuthProvider;
pub use data::RestDataProvider;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP client bound to one backend project.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<Mutex<Option<String>>>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: Arc::new(Mutex::new(config.access_token.clone())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> Option<String> {
        self.token_slot().clone()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.token_slot() = token;
    }

    /// Request against `path`, authenticated with the session token when
    /// there is one and with the anon key otherwise.
    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<String>> {
        match self.access_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// User object as returned by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserDto {
    pub(crate) fn into_identity(self) -> Result<Identity, patentdesk_core::DomainError> {
        Identity::parse(&self.id, self.email.as_deref())
    }
}
