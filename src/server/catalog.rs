//! Role and permission catalog endpoints.
//!
//! Mutation invariants enforced here:
//! - creating a permission with an existing `value` (case-sensitive) or a
//!   role with an existing `name` is a conflict, not a validation error;
//! - a submitted empty permissions array is a deliberate "revoke everything",
//!   distinct from an absent field which keeps the prior set;
//! - deletes are unconditional; dangling references degrade silently at the
//!   resolver.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Permission, PermissionRef, PermissionStatus, Role, RoleStatus};
use crate::notify::{notify_catalog_changed, notify_role_members};

use super::{require_capability, require_principal, AppState};

// --- Permissions ---

#[derive(Debug, Deserialize)]
pub struct CreatePermissionPayload {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<PermissionStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePermissionPayload {
    // `value` is deliberately absent: the slug is a protocol-level identifier
    // and is never renamed, only disabled.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<PermissionStatus>,
}

/// Scalar fields use keep-old-value-if-absent.
pub fn apply_permission_update(perm: &mut Permission, upd: UpdatePermissionPayload) {
    if let Some(name) = upd.name { perm.name = name; }
    if let Some(description) = upd.description { perm.description = Some(description); }
    if let Some(status) = upd.status { perm.status = status; }
    perm.updated_at = Utc::now();
}

pub async fn list_permissions(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Permission>>> {
    require_principal(&state, &headers)?;
    let mut perms = state.store.permissions.list();
    perms.sort_by_key(|p| p.created_at);
    Ok(Json(perms))
}

pub async fn get_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Permission>> {
    require_principal(&state, &headers)?;
    let perm = state
        .store
        .permissions
        .get(&id)
        .ok_or_else(|| AppError::not_found("permission_not_found", "Permission not found"))?;
    Ok(Json(perm))
}

pub async fn create_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePermissionPayload>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    require_principal(&state, &headers)?;
    if payload.name.trim().is_empty() || payload.value.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Name and Value are required"));
    }
    if state.store.find_permission_by_value(&payload.value).is_some() {
        return Err(AppError::conflict("duplicate_value", "Permission value already exists"));
    }
    let mut perm = Permission::new(payload.name, payload.value);
    perm.description = payload.description;
    if let Some(status) = payload.status { perm.status = status; }
    state.store.permissions.put(perm.clone())?;
    notify_catalog_changed(&state.hub);
    Ok((StatusCode::CREATED, Json(perm)))
}

pub async fn update_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePermissionPayload>,
) -> AppResult<Json<Permission>> {
    require_principal(&state, &headers)?;
    let mut perm = state
        .store
        .permissions
        .get(&id)
        .ok_or_else(|| AppError::not_found("permission_not_found", "Permission not found"))?;
    apply_permission_update(&mut perm, payload);
    state.store.permissions.put(perm.clone())?;
    notify_catalog_changed(&state.hub);
    Ok(Json(perm))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    // Unconditional: roles still referencing this id degrade to a dangling
    // reference the resolver drops.
    if !state.store.permissions.remove(&id)? {
        return Err(AppError::not_found("permission_not_found", "Permission not found"));
    }
    notify_catalog_changed(&state.hub);
    Ok(Json(json!({"id": id})))
}

// --- Roles ---

#[derive(Debug, Deserialize)]
pub struct CreateRolePayload {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRef>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRolePayload {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(vec![])` empties the set; `None` (field absent) keeps the prior
    /// set. The one field where those two cases must stay distinguishable.
    #[serde(default)]
    pub permissions: Option<Vec<PermissionRef>>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
}

pub fn apply_role_update(role: &mut Role, upd: UpdateRolePayload) {
    if let Some(name) = upd.name { role.name = name; }
    if let Some(permissions) = upd.permissions { role.permissions = permissions; }
    if let Some(status) = upd.status { role.status = status; }
    role.updated_at = Utc::now();
}

pub async fn list_roles(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Role>>> {
    // Any logged-in user may list roles (needed for assignment dropdowns)
    require_principal(&state, &headers)?;
    let mut roles = state.store.roles.list();
    roles.sort_by_key(|r| r.created_at);
    Ok(Json(roles))
}

pub async fn get_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Role>> {
    require_capability(&state, &headers, "roles_read")?;
    let role = state
        .store
        .roles
        .get(&id)
        .ok_or_else(|| AppError::not_found("role_not_found", "Role not found"))?;
    Ok(Json(role))
}

pub async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRolePayload>,
) -> AppResult<(StatusCode, Json<Role>)> {
    require_capability(&state, &headers, "roles_create")?;
    if payload.name.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Role name is required"));
    }
    if state.store.find_role_by_name(&payload.name).is_some() {
        return Err(AppError::conflict("duplicate_name", "Role already exists"));
    }
    // An empty permission set is valid: the role grants nothing.
    let mut role = Role::new(payload.name, payload.permissions);
    if let Some(status) = payload.status { role.status = status; }
    state.store.roles.put(role.clone())?;
    notify_role_members(&state.store, &state.hub, &role.id);
    notify_catalog_changed(&state.hub);
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> AppResult<Json<Role>> {
    require_capability(&state, &headers, "roles_update")?;
    let mut role = state
        .store
        .roles
        .get(&id)
        .ok_or_else(|| AppError::not_found("role_not_found", "Role not found"))?;
    // Renames honor the same uniqueness as create
    if let Some(name) = &payload.name {
        if state.store.find_role_by_name(name).is_some_and(|other| other.id != id) {
            return Err(AppError::conflict("duplicate_name", "Role already exists"));
        }
    }
    apply_role_update(&mut role, payload);
    state.store.roles.put(role.clone())?;
    // Response is finalized regardless of delivery; notification is
    // fire-and-forget.
    notify_role_members(&state.store, &state.hub, &role.id);
    notify_catalog_changed(&state.hub);
    Ok(Json(role))
}

pub async fn delete_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, "roles_delete")?;
    if state.store.roles.get(&id).is_none() {
        return Err(AppError::not_found("role_not_found", "Role not found"));
    }
    // Affected set is looked up before the delete empties the membership scan.
    let affected: Vec<Uuid> = state.store.find_users_by_role(&id).iter().map(|u| u.id).collect();
    state.store.roles.remove(&id)?;
    for uid in &affected {
        state.hub.emit_to_user(uid, crate::notify::Event::PermissionsUpdated);
    }
    notify_catalog_changed(&state.hub);
    Ok(Json(json!({"message": "Role removed"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_permissions_array_empties_the_set() {
        let mut role = Role::new("staff", vec![PermissionRef::Slug("tasks_read".into())]);
        apply_role_update(&mut role, UpdateRolePayload { permissions: Some(vec![]), ..Default::default() });
        assert!(role.permissions.is_empty());
    }

    #[test]
    fn absent_permissions_field_keeps_prior_set() {
        let prior = vec![PermissionRef::Slug("tasks_read".into())];
        let mut role = Role::new("staff", prior.clone());
        apply_role_update(&mut role, UpdateRolePayload { name: Some("crew".into()), ..Default::default() });
        assert_eq!(role.name, "crew");
        assert_eq!(role.permissions, prior);
    }

    #[test]
    fn update_payload_distinguishes_empty_from_absent() {
        let absent: UpdateRolePayload = serde_json::from_str(r#"{"name":"crew"}"#).unwrap();
        assert!(absent.permissions.is_none());
        let empty: UpdateRolePayload = serde_json::from_str(r#"{"permissions":[]}"#).unwrap();
        assert_eq!(empty.permissions, Some(vec![]));
    }

    #[test]
    fn permission_update_keeps_absent_scalars() {
        let mut perm = Permission::new("Tasks Read", "tasks_read");
        apply_permission_update(&mut perm, UpdatePermissionPayload { status: Some(PermissionStatus::Disabled), ..Default::default() });
        assert_eq!(perm.name, "Tasks Read");
        assert_eq!(perm.value, "tasks_read");
        assert_eq!(perm.status, PermissionStatus::Disabled);
    }
}
