//! Permission resolution: identity -> flattened capability set.
//!
//! Resolution is recomputed from the record store on every check; there is no
//! permission cache, so role and catalog edits take effect on the next check
//! without any invalidation bookkeeping on this side.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use crate::model::{PermissionRef, User, BYPASS_ROLE_NAMES, WILDCARD};
use crate::store::Store;

/// The ephemeral, per-request permission set used for one authorization
/// decision. Either the universal marker or a finite set of capability slugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPermissions {
    /// Grants every capability (admin-like role name or wildcard member).
    All,
    Granted(HashSet<String>),
}

impl ResolvedPermissions {
    pub fn empty() -> Self {
        ResolvedPermissions::Granted(HashSet::new())
    }

    pub fn allows(&self, capability: &str) -> bool {
        match self {
            ResolvedPermissions::All => true,
            ResolvedPermissions::Granted(set) => set.contains(capability),
        }
    }

    /// Flat wire representation for clients: `["*"]` for the universal
    /// marker, otherwise the sorted slugs.
    pub fn to_wire(&self) -> Vec<String> {
        match self {
            ResolvedPermissions::All => vec![WILDCARD.to_string()],
            ResolvedPermissions::Granted(set) => {
                let mut v: Vec<String> = set.iter().cloned().collect();
                v.sort();
                v
            }
        }
    }
}

/// Resolve a user's permission set from current role/permission state.
///
/// No role, or a dangling role reference, resolves to the empty set, never
/// an error. A role named `admin`/`superadmin`, or whose collection contains
/// the wildcard, resolves to the universal marker; the name check dominates
/// regardless of the stored collection. Otherwise each member is normalized:
/// record references map to the record's `value`, bare slugs pass through,
/// and dangling references are dropped silently.
pub fn resolve(store: &Store, user: &User) -> ResolvedPermissions {
    let Some(role_id) = user.role else {
        return ResolvedPermissions::empty();
    };
    let Some(role) = store.find_role_by_id(&role_id) else {
        warn!(user = %user.id, role = %role_id, "role not found during resolution; resolving to empty set");
        return ResolvedPermissions::empty();
    };

    if BYPASS_ROLE_NAMES.contains(&role.name.as_str())
        || role.permissions.iter().any(PermissionRef::is_wildcard)
    {
        return ResolvedPermissions::All;
    }

    let mut slugs: HashSet<String> = HashSet::new();
    let mut ids: Vec<Uuid> = Vec::new();
    for r in &role.permissions {
        match r {
            PermissionRef::Id(id) => ids.push(*id),
            PermissionRef::Slug(s) => {
                slugs.insert(s.clone());
            }
        }
    }
    for perm in store.find_permissions_by_ids(&ids) {
        slugs.insert(perm.value);
    }
    ResolvedPermissions::Granted(slugs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Permission, Role, User};
    use crate::store::SharedStore;
    use tempfile::tempdir;

    fn user_with_role(role: Option<Uuid>) -> User {
        User::new("U", "u", "u@example.com", "x".into(), role)
    }

    #[test]
    fn no_role_resolves_to_empty() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let resolved = resolve(&store, &user_with_role(None));
        assert_eq!(resolved, ResolvedPermissions::empty());
        assert!(!resolved.allows("tasks_read"));
    }

    #[test]
    fn dangling_role_resolves_to_empty() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let resolved = resolve(&store, &user_with_role(Some(Uuid::new_v4())));
        assert_eq!(resolved, ResolvedPermissions::empty());
    }

    #[test]
    fn admin_name_bypasses_even_with_empty_collection() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let role = Role::new("admin", vec![]);
        let role_id = role.id;
        store.roles.put(role).unwrap();
        let resolved = resolve(&store, &user_with_role(Some(role_id)));
        assert_eq!(resolved, ResolvedPermissions::All);
        assert!(resolved.allows("anything_at_all"));
        assert_eq!(resolved.to_wire(), vec!["*".to_string()]);
    }

    #[test]
    fn wildcard_member_bypasses() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let role = Role::new("ops", vec![PermissionRef::Slug("*".into())]);
        let role_id = role.id;
        store.roles.put(role).unwrap();
        assert_eq!(resolve(&store, &user_with_role(Some(role_id))), ResolvedPermissions::All);
    }

    #[test]
    fn mixed_shapes_normalize_and_dangling_refs_drop() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let perm = Permission::new("Tasks Read", "tasks_read");
        let perm_id = perm.id;
        store.permissions.put(perm).unwrap();
        let role = Role::new(
            "staff",
            vec![
                PermissionRef::Id(perm_id),
                PermissionRef::Slug("tasks_create".into()),
                PermissionRef::Id(Uuid::new_v4()), // dangling: dropped silently
            ],
        );
        let role_id = role.id;
        store.roles.put(role).unwrap();
        let resolved = resolve(&store, &user_with_role(Some(role_id)));
        assert_eq!(
            resolved.to_wire(),
            vec!["tasks_create".to_string(), "tasks_read".to_string()]
        );
        assert!(resolved.allows("tasks_read"));
        assert!(!resolved.allows("tasks_delete"));
    }
}
