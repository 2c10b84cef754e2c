//! User (staff) management endpoints. Registration generates a one-time
//! random password returned in the response; credential delivery (email) is
//! an external concern.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::User;
use crate::notify::Event;
use crate::security;

use super::{require_principal, AppState};

/// Public projection of a user record: no password hash, role name included.
fn public_user(state: &AppState, user: &User) -> Value {
    let role_name = user
        .role
        .and_then(|rid| state.store.find_role_by_id(&rid))
        .map(|r| r.name);
    json!({
        "id": user.id,
        "name": user.name,
        "username": user.username,
        "email": user.email,
        "role": user.role,
        "role_name": role_name,
        "status": user.status,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
    })
}

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub role: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<Uuid>,
    #[serde(default)]
    pub password: Option<String>,
}

pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Vec<Value>>> {
    require_principal(&state, &headers)?;
    let mut users = state.store.users.list();
    users.sort_by_key(|u| u.created_at);
    Ok(Json(users.iter().map(|u| public_user(&state, u)).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    let user = state
        .store
        .find_user_by_id(&id)
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    Ok(Json(public_user(&state, &user)))
}

pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_principal(&state, &headers)?;
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() || payload.username.trim().is_empty() {
        return Err(AppError::user("missing_fields", "Missing required fields"));
    }
    let exists = state
        .store
        .users
        .find(|u| u.email == payload.email || u.username == payload.username);
    if exists.is_some() {
        return Err(AppError::conflict("duplicate_user", "User already exists"));
    }

    let plain_password = security::random_password();
    let hashed = security::hash_password(&plain_password)?;
    let user = User::new(payload.name, payload.username, payload.email, hashed, payload.role);
    state.store.users.put(user.clone())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created",
            "user": public_user(&state, &user),
            // Returned exactly once; not retrievable afterwards
            "initial_password": plain_password,
        })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    let mut user = state
        .store
        .find_user_by_id(&id)
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;

    // Username/email stay unique across updates, same as registration
    let taken = state.store.users.find(|other| {
        other.id != id
            && (payload.username.as_deref() == Some(other.username.as_str())
                || payload.email.as_deref() == Some(other.email.as_str()))
    });
    if taken.is_some() {
        return Err(AppError::conflict("duplicate_user", "User already exists"));
    }

    let role_changed = matches!(payload.role, Some(new_role) if user.role != Some(new_role));

    if let Some(name) = payload.name { user.name = name; }
    if let Some(email) = payload.email { user.email = email; }
    if let Some(username) = payload.username { user.username = username; }
    if let Some(role) = payload.role { user.role = Some(role); }
    if let Some(password) = payload.password {
        user.password_hash = security::hash_password(&password)?;
    }
    user.updated_at = Utc::now();
    state.store.users.put(user.clone())?;

    // A role reassignment changes this user's resolved permission set
    if role_changed {
        state.hub.emit_to_user(&user.id, Event::PermissionsUpdated);
    }
    Ok(Json(json!({"message": "User updated successfully"})))
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_principal(&state, &headers)?;
    if state.store.find_user_by_id(&id).is_none() {
        return Err(AppError::not_found("user_not_found", "User not found"));
    }
    state.store.users.remove(&id)?;
    // Drop live sessions and signal the (possibly still connected) client
    state.sessions.revoke_user(&id);
    state.hub.emit_to_user(&id, Event::PermissionsUpdated);
    Ok(Json(json!({"message": "User removed successfully"})))
}
