use thiserror::Error;
use tracing::{debug, warn};

use patentdesk_core::UserId;

use crate::{DataProvider, DataProviderError, Identity, Role};

/// Default collection holding `{id, role}` profile rows.
pub const PROFILE_COLLECTION: &str = "profiles";

/// The role lookup could not reach the backend.
///
/// Callers must treat this as "not admin" and carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not resolve role for user {user_id}")]
pub struct RoleResolutionError {
    pub user_id: UserId,
    #[source]
    pub source: DataProviderError,
}

/// Fetches the role of an identity from the profile collection.
///
/// No caching: every call is a fresh lookup, so repeated calls agree as long
/// as the backend row does not change.
#[derive(Debug, Clone)]
pub struct RoleResolver<D> {
    data: D,
    collection: String,
}

impl<D: DataProvider> RoleResolver<D> {
    pub fn new(data: D) -> Self {
        Self::with_collection(data, PROFILE_COLLECTION)
    }

    pub fn with_collection(data: D, collection: impl Into<String>) -> Self {
        Self {
            data,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    /// Look up the role for `identity`.
    ///
    /// Missing, ambiguous or malformed rows resolve to `Standard`. Only a
    /// transport-level failure is an error.
    pub async fn resolve_role(&self, identity: &Identity) -> Result<Role, RoleResolutionError> {
        let key = identity.id.to_string();
        match self.data.fetch_one(&self.collection, &key).await {
            Ok(Some(row)) => {
                let role = Role::from_profile_row(&row);
                debug!(user_id = %identity.id, %role, "role resolved");
                Ok(role)
            }
            Ok(None) => {
                debug!(user_id = %identity.id, "no profile row; treating as standard");
                Ok(Role::Standard)
            }
            Err(error) if error.is_transport() => Err(RoleResolutionError {
                user_id: identity.id,
                source: error,
            }),
            Err(error) => {
                warn!(user_id = %identity.id, %error, "unusable profile row; treating as standard");
                Ok(Role::Standard)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::{InMemoryProfiles, Row};

    fn setup() -> (Arc<InMemoryProfiles>, RoleResolver<Arc<InMemoryProfiles>>, Identity) {
        let profiles = Arc::new(InMemoryProfiles::new());
        let resolver = RoleResolver::new(Arc::clone(&profiles));
        let identity = Identity::new(UserId::new(), "user7@example.com");
        (profiles, resolver, identity)
    }

    #[tokio::test]
    async fn admin_row_resolves_admin() {
        let (profiles, resolver, identity) = setup();
        profiles.set_role(identity.id, "admin");
        assert_eq!(resolver.resolve_role(&identity).await, Ok(Role::Admin));
    }

    #[tokio::test]
    async fn missing_row_is_standard() {
        let (_, resolver, identity) = setup();
        assert_eq!(resolver.resolve_role(&identity).await, Ok(Role::Standard));
    }

    #[tokio::test]
    async fn ambiguous_rows_are_standard_not_errors() {
        let (profiles, resolver, identity) = setup();
        let key = identity.id.to_string();
        for role in ["admin", "admin"] {
            let row: Row = json!({"id": key, "role": role}).as_object().cloned().unwrap();
            profiles.insert_row(PROFILE_COLLECTION, &key, row);
        }
        assert_eq!(resolver.resolve_role(&identity).await, Ok(Role::Standard));
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let (profiles, resolver, identity) = setup();
        profiles.fail_with(DataProviderError::Transport("timeout".into()));

        let err = resolver.resolve_role(&identity).await.unwrap_err();
        assert_eq!(err.user_id, identity.id);
        assert!(err.source.is_transport());
    }

    #[tokio::test]
    async fn repeated_lookups_agree() {
        let (profiles, resolver, identity) = setup();
        profiles.set_role(identity.id, "admin");

        let first = resolver.resolve_role(&identity).await;
        let second = resolver.resolve_role(&identity).await;
        assert_eq!(first, second);
        assert_eq!(profiles.lookup_count(), 2);
    }

    #[tokio::test]
    async fn custom_collection_is_used() {
        let profiles = Arc::new(InMemoryProfiles::new());
        let resolver = RoleResolver::with_collection(Arc::clone(&profiles), "staff");
        let identity = Identity::new(UserId::new(), "s@example.com");
        let key = identity.id.to_string();
        let row: Row = json!({"id": key, "role": "admin"}).as_object().cloned().unwrap();
        profiles.insert_row("staff", &key, row);

        assert_eq!(resolver.resolve_role(&identity).await, Ok(Role::Admin));
    }
}
