//! Push-notification mechanics shared by the auth providers and the session store.

pub mod registry;

pub use registry::{Listener, ListenerId, ListenerRegistry, RegistryError, Subscription};
