//! Synchronous listener registry (fan-out mechanics only).
//!
//! A `ListenerRegistry` is the push side of an observable value: producers call
//! [`ListenerRegistry::publish`] and every registered listener is invoked
//! synchronously, on the publishing thread, in registration order.
//!
//! ## Delivery
//!
//! - **Synchronous**: `publish` returns only after every listener has run.
//! - **Ordered**: listeners run in the order they subscribed.
//! - **Snapshot**: the listener set is captured when `publish` starts, so a
//!   listener may subscribe or unsubscribe (itself or others) re-entrantly
//!   without deadlocking; such changes take effect from the next publish.
//!
//! ## Lifecycle
//!
//! `close()` drops every listener and makes the registry inert. Subscribing to
//! a closed registry silently yields an inactive [`Subscription`]; publishing
//! to it delivers nothing. Closing twice is a no-op.

use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;

/// A registered callback.
pub type Listener<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Identifier of a registered listener, unique within its registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A listener panicked while the registry lock was held.
    #[error("listener registry lock poisoned")]
    Poisoned,
}

struct State<M> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<M>)>,
    closed: bool,
}

/// Ordered set of listeners for messages of type `M`.
///
/// Cloning yields another handle to the same registry.
pub struct ListenerRegistry<M> {
    state: Arc<Mutex<State<M>>>,
}

impl<M> ListenerRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Returns an inactive subscription if the registry is closed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<M>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let Ok(mut state) = self.state.lock() else {
            tracing::warn!("listener registry poisoned; subscription ignored");
            return Subscription::inactive();
        };

        if state.closed {
            return Subscription::inactive();
        }

        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));

        Subscription {
            id: Some(id),
            state: Arc::downgrade(&self.state),
        }
    }

    /// Deliver `message` to every listener. Returns how many listeners ran.
    pub fn publish(&self, message: &M) -> Result<usize, RegistryError> {
        let snapshot: Vec<Listener<M>> = {
            let state = self.state.lock().map_err(|_| RegistryError::Poisoned)?;
            if state.closed {
                return Ok(0);
            }
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in &snapshot {
            listener(message);
        }

        Ok(snapshot.len())
    }

    /// Drop all listeners and refuse new ones. Idempotent.
    pub fn close(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.closed = true;
        state.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.listeners.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M> Default for ListenerRegistry<M> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 0,
                listeners: Vec::new(),
                closed: false,
            })),
        }
    }
}

impl<M> Clone for ListenerRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<M> core::fmt::Debug for ListenerRegistry<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle returned by [`ListenerRegistry::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription<M> {
    id: Option<ListenerId>,
    state: Weak<Mutex<State<M>>>,
}

impl<M> Subscription<M> {
    fn inactive() -> Self {
        Self {
            id: None,
            state: Weak::new(),
        }
    }

    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        let (Some(id), Some(state)) = (self.id, self.state.upgrade()) else {
            return false;
        };
        state
            .lock()
            .map(|s| s.listeners.iter().any(|(lid, _)| *lid == id))
            .unwrap_or(false)
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let (Some(id), Some(state)) = (self.id, self.state.upgrade()) else {
            return false;
        };
        let mut state = match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }
}

impl<M> core::fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
