//! Login/logout/me endpoints. `/api/auth/me` re-resolves the permission set
//! on every call so catalog edits surface to the client immediately.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::identity::{self, resolve, LoginRequest};

use super::{clear_session_cookie, session_token_from_headers, set_session_cookie, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

fn user_envelope(state: &AppState, user: &crate::model::User) -> Value {
    let role_name = user
        .role
        .and_then(|rid| state.store.find_role_by_id(&rid))
        .map(|r| r.name);
    let permissions = resolve(&state.store, user).to_wire();
    json!({
        "id": user.id,
        "name": user.name,
        "username": user.username,
        "email": user.email,
        "role": role_name,
        "permissions": permissions,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<(HeaderMap, Json<Value>)> {
    let req = LoginRequest { username: payload.username, password: payload.password };
    let resp = identity::login(&state.store, &state.sessions, &req)?;
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_session_cookie(&resp.session.token));
    Ok((headers, Json(user_envelope(&state, &resp.user))))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, HeaderMap, Json<Value>) {
    if let Some(token) = session_token_from_headers(&headers) {
        state.sessions.logout(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"message": "Logged out"})))
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let principal = super::require_principal(&state, &headers)?;
    let user = state
        .store
        .find_user_by_id(&principal.user_id)
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    Ok(Json(user_envelope(&state, &user)))
}
