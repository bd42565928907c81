//! In-memory providers for tests and local runs.
//!
//! - No IO
//! - Pushes are delivered synchronously from the mutating call
//! - Failures can be injected to exercise the fail-closed paths

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use patentdesk_core::UserId;
use patentdesk_events::{ListenerRegistry, Subscription};

use crate::provider::{AuthProvider, AuthProviderError, DataProvider, DataProviderError, Row};
use crate::{Identity, RestoredSession, SessionChange};

type RestoreHook = Arc<dyn Fn() + Send + Sync>;

/// Auth backend double: a persisted session slot plus a change feed.
#[derive(Default)]
pub struct InMemoryAuthProvider {
    persisted: Mutex<Option<RestoredSession>>,
    restore_failure: Mutex<Option<AuthProviderError>>,
    restore_hook: Mutex<Option<RestoreHook>>,
    changes: ListenerRegistry<SessionChange>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `identity` already persisted (as after a previous visit).
    pub fn with_session(identity: Identity) -> Self {
        let provider = Self::new();
        provider.persist(RestoredSession::new(identity));
        provider
    }

    /// Replace the persisted session without pushing a change.
    pub fn persist(&self, session: RestoredSession) {
        *guard(&self.persisted) = Some(session);
    }

    /// Make every subsequent restore fail with `error`.
    pub fn fail_restore(&self, error: AuthProviderError) {
        *guard(&self.restore_failure) = Some(error);
    }

    /// Run `hook` at the start of every restore, before it answers.
    pub fn on_restore<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *guard(&self.restore_hook) = Some(Arc::new(hook));
    }

    pub fn sign_in(&self, identity: Identity) {
        self.persist(RestoredSession::new(identity.clone()));
        self.push(SessionChange::signed_in(identity));
    }

    pub fn sign_out(&self) {
        guard(&self.persisted).take();
        self.push(SessionChange::signed_out());
    }

    /// Push a token refresh for the persisted identity. No-op when signed out.
    pub fn refresh_token(&self) {
        let identity = guard(&self.persisted).as_ref().map(|s| s.identity.clone());
        if let Some(identity) = identity {
            self.push(SessionChange::token_refreshed(identity));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.changes.len()
    }

    fn push(&self, change: SessionChange) {
        if let Err(error) = self.changes.publish(&change) {
            tracing::warn!(%error, "in-memory auth provider could not push change");
        }
    }
}

impl AuthProvider for InMemoryAuthProvider {
    async fn current_session(&self) -> Result<Option<RestoredSession>, AuthProviderError> {
        let hook = guard(&self.restore_hook).clone();
        if let Some(hook) = hook {
            hook();
        }

        if let Some(error) = guard(&self.restore_failure).clone() {
            return Err(error);
        }

        Ok(guard(&self.persisted).clone())
    }

    fn on_session_change<F>(&self, callback: F) -> Subscription<SessionChange>
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }
}

/// Row store double keyed by `(collection, id)`.
///
/// Several rows may share a key so that ambiguous lookups can be tested.
#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    rows: Mutex<HashMap<(String, String), Vec<Row>>>,
    failure: Mutex<Option<DataProviderError>>,
    lookups: AtomicUsize,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a `{id, role}` row in the `profiles` collection.
    pub fn set_role(&self, user: UserId, role: &str) {
        let key = user.to_string();
        let mut row = Row::new();
        row.insert("id".into(), Value::String(key.clone()));
        row.insert("role".into(), Value::String(role.to_string()));
        guard(&self.rows).insert((crate::PROFILE_COLLECTION.to_string(), key), vec![row]);
    }

    /// Append a raw row (a second row under the same key makes lookups ambiguous).
    pub fn insert_row(&self, collection: &str, key: &str, row: Row) {
        guard(&self.rows)
            .entry((collection.to_string(), key.to_string()))
            .or_default()
            .push(row);
    }

    pub fn remove(&self, collection: &str, key: &str) {
        guard(&self.rows).remove(&(collection.to_string(), key.to_string()));
    }

    /// Make every lookup fail with `error` until [`InMemoryProfiles::recover`].
    pub fn fail_with(&self, error: DataProviderError) {
        *guard(&self.failure) = Some(error);
    }

    pub fn recover(&self) {
        guard(&self.failure).take();
    }

    /// Number of `fetch_one` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl DataProvider for InMemoryProfiles {
    async fn fetch_one(&self, collection: &str, key: &str) -> Result<Option<Row>, DataProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = guard(&self.failure).clone() {
            return Err(error);
        }

        let rows = guard(&self.rows)
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_default();

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            count => Err(DataProviderError::Ambiguous {
                collection: collection.to_string(),
                count,
            }),
        }
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profiles_report_missing_single_and_ambiguous_rows() {
        let profiles = InMemoryProfiles::new();
        let user = UserId::new();
        let key = user.to_string();

        assert_eq!(profiles.fetch_one("profiles", &key).await, Ok(None));

        profiles.set_role(user, "admin");
        let row = profiles.fetch_one("profiles", &key).await.unwrap().unwrap();
        assert_eq!(row.get("role"), Some(&Value::String("admin".into())));

        profiles.insert_row("profiles", &key, Row::new());
        assert!(matches!(
            profiles.fetch_one("profiles", &key).await,
            Err(DataProviderError::Ambiguous { count: 2, .. })
        ));
        assert_eq!(profiles.lookup_count(), 3);
    }

    #[tokio::test]
    async fn injected_failure_until_recovered() {
        let profiles = InMemoryProfiles::new();
        profiles.fail_with(DataProviderError::Transport("down".into()));
        assert!(profiles.fetch_one("profiles", "x").await.is_err());
        profiles.recover();
        assert_eq!(profiles.fetch_one("profiles", "x").await, Ok(None));
    }

    #[tokio::test]
    async fn refresh_without_session_pushes_nothing() {
        let provider = InMemoryAuthProvider::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        provider.on_session_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        provider.refresh_token();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        provider.sign_in(Identity::new(UserId::new(), "d@example.com"));
        provider.refresh_token();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
