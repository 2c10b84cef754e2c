//! Request-time authorization gate over the permission resolver.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::Store;

use super::resolver::resolve;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The resolved set does not contain the required capability.
    MissingCapability(String),
    /// The identity could not be loaded at all. Harder failure than a normal
    /// permission miss; logged distinctly, but the client-visible outcome is
    /// the same forbidden response.
    IdentityNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Map a denial to the uniform forbidden error. The response body never
    /// names the missing capability, so unauthorized callers cannot probe
    /// which capabilities exist.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(_) => Err(AppError::forbidden("forbidden", "access denied")),
        }
    }
}

/// Decide whether the identity may perform the named operation.
///
/// Resolves the permission set from current store state on every call, with
/// no cross-request caching, so the gate is safely composable within a request
/// path and permission edits take effect on the very next check. Side effects
/// are limited to logging; failures resolve to deny, never fail-open.
pub fn authorize(store: &Store, user_id: Uuid, capability: &str) -> Decision {
    let Some(user) = store.find_user_by_id(&user_id) else {
        warn!(user = %user_id, capability, "authorization denied: identity/role not found");
        return Decision::Deny(DenyReason::IdentityNotFound);
    };
    let resolved = resolve(store, &user);
    if resolved.allows(capability) {
        debug!(user = %user_id, capability, "authorization allowed");
        Decision::Allow
    } else {
        debug!(user = %user_id, capability, "authorization denied: missing capability '{}'", capability);
        Decision::Deny(DenyReason::MissingCapability(capability.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PermissionRef, Role, User};
    use crate::store::SharedStore;
    use tempfile::tempdir;

    #[test]
    fn unknown_identity_is_denied_distinctly() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let d = authorize(&store, Uuid::new_v4(), "tasks_read");
        assert_eq!(d, Decision::Deny(DenyReason::IdentityNotFound));
        // Both deny reasons surface as the same client-visible outcome
        let err = d.into_result().unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert!(!err.message().contains("tasks_read"));
    }

    #[test]
    fn missing_capability_is_denied() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let role = Role::new("staff", vec![PermissionRef::Slug("tasks_read".into())]);
        let role_id = role.id;
        store.roles.put(role).unwrap();
        let user = User::new("U", "u", "u@example.com", "x".into(), Some(role_id));
        let uid = user.id;
        store.users.put(user).unwrap();

        assert!(authorize(&store, uid, "tasks_read").is_allow());
        assert_eq!(
            authorize(&store, uid, "tasks_delete"),
            Decision::Deny(DenyReason::MissingCapability("tasks_delete".into()))
        );
    }
}
