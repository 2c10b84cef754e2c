//! Catalog and workload record types persisted by the document store.
//! Permissions, roles and users form the access-control catalogs; projects,
//! tasks, issues and task statuses are the guarded business records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved permission value granting every capability when present in a
/// role's permission collection.
pub const WILDCARD: &str = "*";

/// Role names that bypass permission checks entirely, independent of the
/// role's stored permission collection.
pub const BYPASS_ROLE_NAMES: [&str; 2] = ["admin", "superadmin"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    #[default]
    Active,
    Inactive,
}

/// A grantable capability. `value` is the protocol-level slug other components
/// key on (e.g. `tasks_read`); it is unique and never renamed, only disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: PermissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            value: value.into(),
            description: None,
            status: PermissionStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A role's permission collection holds either references to Permission
/// records or bare capability slugs (including the wildcard). Data seeded
/// through different paths uses either shape, so both are first-class and
/// normalization happens once, at the resolver boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRef {
    Id(Uuid),
    Slug(String),
}

impl PermissionRef {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, PermissionRef::Slug(s) if s == WILDCARD)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRef>,
    #[serde(default)]
    pub status: RoleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: Vec<PermissionRef>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            permissions,
            status: RoleStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Reference into the role registry; a user with no role resolves to the
    /// empty permission set.
    #[serde(default)]
    pub role: Option<Uuid>,
    #[serde(default = "default_user_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_user_status() -> String { "Active".to_string() }

impl User {
    pub fn new(name: impl Into<String>, username: impl Into<String>, email: impl Into<String>, password_hash: String, role: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            username: username.into(),
            email: email.into(),
            password_hash,
            role,
            status: default_user_status(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_users: Vec<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Reference into the task-status catalog.
    #[serde(default)]
    pub status: Option<Uuid>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Under Review")]
    UnderReview,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub project: Uuid,
    pub reported_by: Uuid,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(default)]
    pub severity: IssueSeverity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub status: RoleStatus,
    pub project: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_ref_accepts_both_shapes() {
        // A uuid string deserializes as a record reference
        let id = Uuid::new_v4();
        let r: PermissionRef = serde_json::from_value(serde_json::json!(id.to_string())).unwrap();
        assert_eq!(r, PermissionRef::Id(id));

        // A bare slug deserializes as a slug
        let r: PermissionRef = serde_json::from_value(serde_json::json!("tasks_read")).unwrap();
        assert_eq!(r, PermissionRef::Slug("tasks_read".into()));

        // The wildcard is a slug and is recognized
        let r: PermissionRef = serde_json::from_value(serde_json::json!("*")).unwrap();
        assert!(r.is_wildcard());
    }
}
