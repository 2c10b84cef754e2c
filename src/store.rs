//!
//! opsboard document store
//! -----------------------
//! A small JSON-backed document store with one file per collection under a
//! configured root folder. Collections are loaded into memory at startup and
//! written back whole on every mutation, so a mutation is a single atomic
//! replace of one entity followed by one file write. Lookups never error:
//! "not found" is `None`.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<Store>`) elsewhere in the codebase.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::model::{Issue, Permission, Project, Role, Task, TaskStatus, User};

/// A record addressable by id within one named collection.
pub trait Doc: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    fn id(&self) -> Uuid;
}

impl Doc for User {
    const COLLECTION: &'static str = "users";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for Role {
    const COLLECTION: &'static str = "roles";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for Permission {
    const COLLECTION: &'static str = "permissions";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for Project {
    const COLLECTION: &'static str = "projects";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for Task {
    const COLLECTION: &'static str = "tasks";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for Issue {
    const COLLECTION: &'static str = "issues";
    fn id(&self) -> Uuid { self.id }
}
impl Doc for TaskStatus {
    const COLLECTION: &'static str = "task_statuses";
    fn id(&self) -> Uuid { self.id }
}

/// One in-memory collection with write-through JSON persistence.
pub struct Collection<T: Doc> {
    path: PathBuf,
    items: RwLock<HashMap<Uuid, T>>,
}

impl<T: Doc> Collection<T> {
    fn open(root: &Path) -> Result<Self> {
        let path = root.join(format!("{}.json", T::COLLECTION));
        let items = if path.exists() {
            let bytes = fs::read(&path)
                .with_context(|| format!("reading collection file {}", path.display()))?;
            let list: Vec<T> = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing collection file {}", path.display()))?;
            list.into_iter().map(|d| (d.id(), d)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self { path, items: RwLock::new(items) })
    }

    /// Persist the full collection. Callers hold the write lock so a mutation
    /// and its file write are a single step from the store's point of view.
    fn save_locked(&self, items: &HashMap<Uuid, T>) -> Result<()> {
        let list: Vec<&T> = items.values().collect();
        let bytes = serde_json::to_vec_pretty(&list)?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("writing collection file {}", self.path.display()))?;
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.items.read().get(id).cloned()
    }

    pub fn find<F: Fn(&T) -> bool>(&self, pred: F) -> Option<T> {
        self.items.read().values().find(|d| pred(d)).cloned()
    }

    pub fn filter<F: Fn(&T) -> bool>(&self, pred: F) -> Vec<T> {
        self.items.read().values().filter(|d| pred(d)).cloned().collect()
    }

    pub fn list(&self) -> Vec<T> {
        self.items.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Insert or replace one record, then persist.
    pub fn put(&self, doc: T) -> Result<()> {
        let mut items = self.items.write();
        items.insert(doc.id(), doc);
        self.save_locked(&items)
    }

    /// Remove one record, then persist. Returns false when the id was absent.
    pub fn remove(&self, id: &Uuid) -> Result<bool> {
        let mut items = self.items.write();
        if items.remove(id).is_none() {
            return Ok(false);
        }
        self.save_locked(&items)?;
        Ok(true)
    }
}

/// Root store handle owning all collections.
pub struct Store {
    root: PathBuf,
    pub users: Collection<User>,
    pub roles: Collection<Role>,
    pub permissions: Collection<Permission>,
    pub projects: Collection<Project>,
    pub tasks: Collection<Task>,
    pub issues: Collection<Issue>,
    pub task_statuses: Collection<TaskStatus>,
}

/// Cloneable, thread-safe handle shared across handlers and background tasks.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Store>);

impl std::ops::Deref for SharedStore {
    type Target = Store;
    fn deref(&self) -> &Store { &self.0 }
}

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(SharedStore(Arc::new(Store::open(root)?)))
    }
}

impl Store {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating store root {}", root.display()))?;
        let store = Self {
            users: Collection::open(&root)?,
            roles: Collection::open(&root)?,
            permissions: Collection::open(&root)?,
            projects: Collection::open(&root)?,
            tasks: Collection::open(&root)?,
            issues: Collection::open(&root)?,
            task_statuses: Collection::open(&root)?,
            root,
        };
        debug!(root = %store.root.display(), "store opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path { &self.root }

    // --- Lookup surface used by the resolver, gate and notifier ---

    pub fn find_user_by_id(&self, id: &Uuid) -> Option<User> {
        self.users.get(id)
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users.find(|u| u.username == username)
    }

    /// Every user currently assigned to the given role. Computed by scan at
    /// call time; membership may have changed since a role was loaded.
    pub fn find_users_by_role(&self, role_id: &Uuid) -> Vec<User> {
        self.users.filter(|u| u.role.as_ref() == Some(role_id))
    }

    pub fn find_role_by_id(&self, id: &Uuid) -> Option<Role> {
        self.roles.get(id)
    }

    pub fn find_role_by_name(&self, name: &str) -> Option<Role> {
        self.roles.find(|r| r.name == name)
    }

    pub fn find_permissions_by_ids(&self, ids: &[Uuid]) -> Vec<Permission> {
        // Preserves input order; dangling ids are silently skipped.
        ids.iter().filter_map(|id| self.permissions.get(id)).collect()
    }

    /// Case-sensitive exact match on the capability slug.
    pub fn find_permission_by_value(&self, value: &str) -> Option<Permission> {
        self.permissions.find(|p| p.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PermissionRef;
    use tempfile::tempdir;

    #[test]
    fn put_get_remove_round_trip() -> Result<()> {
        let tmp = tempdir()?;
        let store = SharedStore::new(tmp.path())?;

        let perm = Permission::new("Tasks Read", "tasks_read");
        let id = perm.id;
        store.permissions.put(perm)?;
        assert!(store.permissions.get(&id).is_some());
        assert!(store.find_permission_by_value("tasks_read").is_some());
        assert!(store.find_permission_by_value("TASKS_READ").is_none());

        assert!(store.permissions.remove(&id)?);
        assert!(!store.permissions.remove(&id)?);
        assert!(store.permissions.get(&id).is_none());
        Ok(())
    }

    #[test]
    fn collections_survive_reopen() -> Result<()> {
        let tmp = tempdir()?;
        let role_id;
        {
            let store = SharedStore::new(tmp.path())?;
            let role = Role::new("staff", vec![PermissionRef::Slug("tasks_read".into())]);
            role_id = role.id;
            store.roles.put(role)?;
        }
        let store = SharedStore::new(tmp.path())?;
        let role = store.find_role_by_id(&role_id).expect("role persisted");
        assert_eq!(role.name, "staff");
        assert_eq!(role.permissions, vec![PermissionRef::Slug("tasks_read".into())]);
        Ok(())
    }

    #[test]
    fn dangling_permission_ids_are_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let store = SharedStore::new(tmp.path())?;
        let perm = Permission::new("Tasks Read", "tasks_read");
        let kept = perm.id;
        store.permissions.put(perm)?;
        let got = store.find_permissions_by_ids(&[Uuid::new_v4(), kept]);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, kept);
        Ok(())
    }
}
