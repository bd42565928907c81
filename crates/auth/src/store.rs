//! Process-local holder of the current session.
//!
//! The store starts `Unknown`, resolves once through [`SessionStore::initialize`]
//! and from then on mirrors the sessions pushed by its [`AuthProvider`]. Every
//! change is republished to the store's own listeners, synchronously and in
//! registration order.
//!
//! A push that lands while `initialize` is still awaiting the restore is newer
//! than the restore, so the restore result is dropped in its favour. The push
//! is held back until the restore completes: listeners see nothing but
//! `Unknown` before `initialize` returns.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use patentdesk_events::{ListenerRegistry, Subscription};

use crate::token::validate_claims;
use crate::{AuthProvider, AuthProviderError, Session, SessionChange, TokenValidationError};

/// Why a persisted session could not be restored. Always degrades to `Anonymous`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionRestoreError {
    #[error("session restore failed: {0}")]
    Provider(#[from] AuthProviderError),

    #[error("persisted session rejected: {0}")]
    InvalidToken(#[from] TokenValidationError),
}

#[derive(Debug, Default)]
struct Shared {
    session: Session,
    /// Number of provider pushes applied so far.
    pushes: u64,
    /// Set while `initialize` awaits the restore.
    restoring: bool,
    /// Latest session pushed during the restore, published when it completes.
    held: Option<Session>,
    torn_down: bool,
}

/// Injectable session store with an explicit lifecycle.
pub struct SessionStore<P: AuthProvider> {
    provider: Arc<P>,
    shared: Arc<Mutex<Shared>>,
    listeners: ListenerRegistry<Session>,
    upstream: Mutex<Option<Subscription<SessionChange>>>,
}

impl<P: AuthProvider> SessionStore<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            shared: Arc::new(Mutex::new(Shared::default())),
            listeners: ListenerRegistry::new(),
            upstream: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// The latest known session.
    pub fn current(&self) -> Session {
        lock(&self.shared).session.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        lock(&self.shared).torn_down
    }

    /// Restore the persisted session and start mirroring provider pushes.
    ///
    /// Calling this again re-initializes: the session drops back to `Unknown`
    /// (published to listeners) and is restored afresh. After teardown this is
    /// a no-op returning the last session.
    pub async fn initialize(&self) -> Session {
        let (started_at, reset) = {
            let mut shared = lock(&self.shared);
            if shared.torn_down {
                debug!("initialize after teardown ignored");
                return shared.session.clone();
            }
            let reset = !shared.session.is_unknown();
            shared.session = Session::Unknown;
            shared.restoring = true;
            shared.held = None;
            (shared.pushes, reset)
        };

        if reset {
            self.publish(&Session::Unknown);
        }

        self.attach_upstream();

        let restored = match self.restore().await {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "could not restore session; continuing as anonymous");
                Session::Anonymous
            }
        };

        let session = {
            let mut shared = lock(&self.shared);
            shared.restoring = false;
            let held = shared.held.take();
            if shared.torn_down {
                return shared.session.clone();
            }
            let session = match held {
                Some(pushed) if shared.pushes != started_at => {
                    debug!(
                        session = pushed.label(),
                        "restore superseded by a pushed session change"
                    );
                    pushed
                }
                _ => restored,
            };
            shared.session = session.clone();
            session
        };

        info!(session = session.label(), "session initialized");
        self.publish(&session);
        session
    }

    /// Register a listener for session changes. No-op after teardown.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<Session>
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Drop every listener and detach from the provider. Idempotent.
    pub fn teardown(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.torn_down {
                return;
            }
            shared.torn_down = true;
        }

        self.listeners.close();
        let upstream = match self.upstream.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = upstream {
            subscription.unsubscribe();
        }
        info!("session store torn down");
    }

    async fn restore(&self) -> Result<Session, SessionRestoreError> {
        let Some(restored) = self.provider.current_session().await? else {
            return Ok(Session::Anonymous);
        };

        if let Some(claims) = &restored.claims {
            validate_claims(claims, restored.identity.id, Utc::now())?;
        }

        Ok(Session::Authenticated(restored.identity))
    }

    fn attach_upstream(&self) {
        let mut upstream = match self.upstream.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if upstream.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let listeners = self.listeners.clone();
        let subscription = self.provider.on_session_change(move |change| {
            let session = change.session();
            {
                let mut shared = lock(&shared);
                if shared.torn_down {
                    return;
                }
                shared.pushes += 1;
                if shared.restoring {
                    // Nothing but Unknown is published until the restore completes.
                    debug!(kind = ?change.kind, "session change held until restore completes");
                    shared.held = Some(session);
                    return;
                }
                shared.session = session.clone();
            }

            debug!(kind = ?change.kind, session = session.label(), "session change pushed");
            if let Err(error) = listeners.publish(&session) {
                warn!(%error, "failed to deliver session change");
            }
        });

        *upstream = Some(subscription);
    }

    fn publish(&self, session: &Session) {
        if let Err(error) = self.listeners.publish(session) {
            warn!(%error, "failed to deliver session change");
        }
    }
}

impl<P: AuthProvider> Drop for SessionStore<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
