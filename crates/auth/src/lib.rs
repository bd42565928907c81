//! `patentdesk-auth`: session tracking and route authorization.
//!
//! Everything here is independent of HTTP and of any UI toolkit. Backend access
//! goes through the [`AuthProvider`] and [`DataProvider`] seams.

pub mod decision;
pub mod gate;
pub mod identity;
pub mod memory;
pub mod provider;
pub mod requirement;
pub mod resolver;
pub mod role;
pub mod session;
pub mod store;
pub mod token;

pub use decision::{Decision, DecisionReason, Explanation, GatePolicy, decide, explain};
pub use gate::{GateState, GateStep, LookupTicket, RoleLookup, RouteGate};
pub use identity::Identity;
pub use memory::{InMemoryAuthProvider, InMemoryProfiles};
pub use provider::{
    AuthProvider, AuthProviderError, DataProvider, DataProviderError, RestoredSession, Row,
};
pub use requirement::AuthorizationRequirement;
pub use resolver::{PROFILE_COLLECTION, RoleResolutionError, RoleResolver};
pub use role::{Role, RoleState};
pub use session::{Session, SessionChange, SessionChangeKind};
pub use store::{SessionRestoreError, SessionStore};
pub use token::{SessionClaims, TokenValidationError, validate_claims};
