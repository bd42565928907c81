use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use patentdesk_auth::{
    AuthProvider, AuthProviderError, Identity, RestoredSession, SessionChange, SessionClaims,
};
use patentdesk_events::{ListenerRegistry, Subscription};

use super::{BackendClient, UserDto};

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct SignUpMetadata<'a> {
    full_name: &'a str,
}

/// Sign-up answers with a session when the project auto-confirms accounts and
/// with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpDto {
    Session { user: UserDto },
    User(UserDto),
}

impl SignUpDto {
    fn into_user(self) -> UserDto {
        match self {
            Self::Session { user } | Self::User(user) => user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenDto {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserDto,
}

impl TokenDto {
    fn claims(&self, identity: &Identity, now: DateTime<Utc>) -> Option<SessionClaims> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0)?,
            (None, Some(secs)) => now + Duration::seconds(secs),
            (None, None) => return None,
        };
        Some(SessionClaims {
            sub: identity.id,
            issued_at: now,
            expires_at,
        })
    }
}

/// Session access over the backend's auth endpoints.
///
/// Sign-in and sign-out go through this provider so that their session
/// changes are pushed to subscribers.
pub struct RestAuthProvider {
    client: BackendClient,
    claims: Mutex<Option<SessionClaims>>,
    changes: ListenerRegistry<SessionChange>,
}

impl RestAuthProvider {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            claims: Mutex::new(None),
            changes: ListenerRegistry::new(),
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Exchange email and password for a session token.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthProviderError> {
        let token: TokenDto = self
            .post_credentials(
                "/auth/v1/token?grant_type=password",
                &PasswordGrant { email, password },
                &[StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED],
            )
            .await?;

        let identity = parse_user(token.user.clone())?;
        let claims = token.claims(&identity, Utc::now());

        self.client.set_access_token(Some(token.access_token));
        *self.claims_slot() = claims;

        info!(user_id = %identity.id, "signed in");
        self.push(SessionChange::signed_in(identity.clone()));
        Ok(identity)
    }

    /// Register a new account.
    ///
    /// The visitor is not signed in by this: no token is kept and no session
    /// change is pushed. Roles are assigned by the backend, never here.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, AuthProviderError> {
        let request = SignUpRequest {
            email,
            password,
            data: SignUpMetadata { full_name },
        };
        let answer: SignUpDto = self
            .post_credentials(
                "/auth/v1/signup",
                &request,
                &[StatusCode::BAD_REQUEST, StatusCode::UNPROCESSABLE_ENTITY],
            )
            .await?;

        let identity = parse_user(answer.into_user())?;
        info!(user_id = %identity.id, "account registered");
        Ok(identity)
    }

    /// POST a credential body; `rejected` statuses mean the backend refused the credentials.
    async fn post_credentials<T, B>(
        &self,
        path: &str,
        body: &B,
        rejected: &[StatusCode],
    ) -> Result<T, AuthProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if rejected.contains(&status) {
            debug!(status = status.as_u16(), path, "credentials rejected");
            return Err(AuthProviderError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthProviderError::Decode(e.to_string()))
    }

    /// End the session. The local session is dropped even if the backend
    /// cannot be told.
    pub async fn sign_out(&self) {
        if self.client.access_token().is_some() {
            let result = self
                .client
                .request(Method::POST, "/auth/v1/logout")
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => warn!(status = response.status().as_u16(), "backend refused logout"),
                Err(error) => warn!(%error, "could not reach backend to log out"),
            }
        }

        self.client.set_access_token(None);
        self.claims_slot().take();
        info!("signed out");
        self.push(SessionChange::signed_out());
    }

    fn push(&self, change: SessionChange) {
        if let Err(error) = self.changes.publish(&change) {
            warn!(%error, "could not deliver session change");
        }
    }

    fn claims_slot(&self) -> MutexGuard<'_, Option<SessionClaims>> {
        match self.claims.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AuthProvider for RestAuthProvider {
    async fn current_session(&self) -> Result<Option<RestoredSession>, AuthProviderError> {
        if self.client.access_token().is_none() {
            return Ok(None);
        }

        let response = self
            .client
            .request(Method::GET, "/auth/v1/user")
            .send()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), "persisted token rejected by backend");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let user: UserDto = response
            .json()
            .await
            .map_err(|e| AuthProviderError::Decode(e.to_string()))?;
        let identity = parse_user(user)?;
        let claims = self
            .claims_slot()
            .clone()
            .filter(|claims| claims.sub == identity.id);

        Ok(Some(RestoredSession { identity, claims }))
    }

    fn on_session_change<F>(&self, callback: F) -> Subscription<SessionChange>
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }
}

fn parse_user(user: UserDto) -> Result<Identity, AuthProviderError> {
    user.into_identity()
        .map_err(|e| AuthProviderError::Decode(e.to_string()))
}
