//! First-run seeding: the permission matrix, the built-in roles and the
//! default admin account.

use anyhow::Result;
use tracing::info;

use crate::model::{Permission, PermissionRef, Role, User};
use crate::security;
use crate::store::SharedStore;

const RESOURCES: [&str; 4] = ["tasks", "staff", "roles", "projects"];
const ACTIONS: [&str; 4] = ["read", "create", "update", "delete"];

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "opsboard";

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Create the resource/action permission matrix and the `admin` and `staff`
/// roles on an empty catalog. A populated catalog is left untouched.
pub fn ensure_seed_catalog(store: &SharedStore) -> Result<()> {
    if !store.permissions.is_empty() {
        return Ok(());
    }

    let mut created: Vec<Permission> = Vec::new();
    for res in RESOURCES {
        for act in ACTIONS {
            let perm = Permission::new(
                format!("{} {}", title_case(res), title_case(act)),
                format!("{}_{}", res, act),
            );
            store.permissions.put(perm.clone())?;
            created.push(perm);
        }
    }
    info!(count = created.len(), "seeded permission matrix");

    // Admin gets every permission by record reference; the name-based bypass
    // makes the role universal either way.
    let admin_perms: Vec<PermissionRef> = created.iter().map(|p| PermissionRef::Id(p.id)).collect();

    // Staff: tasks minus delete, plus read-only staff list
    let staff_perms: Vec<PermissionRef> = created
        .iter()
        .filter(|p| {
            (p.value.starts_with("tasks_") && !p.value.ends_with("_delete"))
                || p.value == "staff_read"
        })
        .map(|p| PermissionRef::Id(p.id))
        .collect();

    store.roles.put(Role::new("admin", admin_perms))?;
    store.roles.put(Role::new("staff", staff_perms))?;
    info!("seeded roles 'admin' and 'staff'");
    Ok(())
}

/// Create the default admin user if no user with that username exists yet.
pub fn ensure_default_admin(store: &SharedStore) -> Result<()> {
    if store.find_user_by_username(DEFAULT_ADMIN_USERNAME).is_some() {
        return Ok(());
    }
    let admin_role = store.find_role_by_name("admin").map(|r| r.id);
    let hash = security::hash_password(DEFAULT_ADMIN_PASSWORD)?;
    let user = User::new("Administrator", DEFAULT_ADMIN_USERNAME, "admin@localhost", hash, admin_role);
    store.users.put(user)?;
    info!(username = DEFAULT_ADMIN_USERNAME, "created default admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{authorize, resolve, ResolvedPermissions};
    use tempfile::tempdir;

    #[test]
    fn seeding_is_idempotent() -> Result<()> {
        let tmp = tempdir()?;
        let store = SharedStore::new(tmp.path())?;
        ensure_seed_catalog(&store)?;
        let count = store.permissions.len();
        assert_eq!(count, RESOURCES.len() * ACTIONS.len());
        ensure_seed_catalog(&store)?;
        assert_eq!(store.permissions.len(), count);
        Ok(())
    }

    #[test]
    fn seeded_admin_is_universal_and_staff_is_scoped() -> Result<()> {
        let tmp = tempdir()?;
        let store = SharedStore::new(tmp.path())?;
        ensure_seed_catalog(&store)?;
        ensure_default_admin(&store)?;

        let admin = store.find_user_by_username(DEFAULT_ADMIN_USERNAME).unwrap();
        assert_eq!(resolve(&store, &admin), ResolvedPermissions::All);
        assert!(authorize(&store, admin.id, "anything_at_all").is_allow());

        let staff_role = store.find_role_by_name("staff").unwrap();
        let staff = User::new("S", "s", "s@example.com", "x".into(), Some(staff_role.id));
        let staff_id = staff.id;
        store.users.put(staff)?;
        assert!(authorize(&store, staff_id, "tasks_read").is_allow());
        assert!(authorize(&store, staff_id, "staff_read").is_allow());
        assert!(!authorize(&store, staff_id, "tasks_delete").is_allow());
        assert!(!authorize(&store, staff_id, "roles_update").is_allow());
        Ok(())
    }
}
