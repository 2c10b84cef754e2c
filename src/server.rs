//!
//! opsboard HTTP/WS server
//! -----------------------
//! This module defines the Axum-based HTTP API and WebSocket interface for
//! opsboard.
//!
//! Responsibilities:
//! - Session management with a simple cookie token model.
//! - Login/logout/me endpoints backed by the `identity` module.
//! - Catalog (roles/permissions), user and work-item CRUD endpoints, each
//!   gated on its declared capability before the handler body runs.
//! - WebSocket endpoint pushing permission invalidation events per user.
//! - First-run catalog seeding and default admin provisioning.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{authorize, Principal, SessionManager};
use crate::notify::RealtimeHub;
use crate::store::SharedStore;

pub mod auth;
pub mod catalog;
pub mod users;
pub mod work;
pub mod ws;

const SESSION_COOKIE: &str = "opsboard_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub hub: Arc<RealtimeHub>,
    pub sessions: Arc<SessionManager>,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

/// The "identity verifier" step: a valid session cookie yields a trusted
/// principal; everything downstream consumes only the user id.
pub fn require_principal(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    let token = session_token_from_headers(headers)
        .ok_or_else(|| AppError::auth("unauthorized", "not logged in"))?;
    state
        .sessions
        .validate(&token)
        .ok_or_else(|| AppError::auth("unauthorized", "not logged in"))
}

/// Authorization gate entry point: one required capability per protected
/// operation, checked against a freshly resolved permission set.
pub fn require_capability(state: &AppState, headers: &HeaderMap, capability: &str) -> AppResult<Principal> {
    let principal = require_principal(state, headers)?;
    authorize(&state.store, principal.user_id, capability).into_result()?;
    Ok(principal)
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Lax
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, token)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE)).unwrap()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "opsboard ok" }))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/permissions", get(catalog::list_permissions).post(catalog::create_permission))
        .route(
            "/api/permissions/{id}",
            get(catalog::get_permission).put(catalog::update_permission).delete(catalog::delete_permission),
        )
        .route("/api/roles", get(catalog::list_roles).post(catalog::create_role))
        .route(
            "/api/roles/{id}",
            get(catalog::get_role).put(catalog::update_role).delete(catalog::delete_role),
        )
        .route("/api/users", get(users::list_users).post(users::register_user))
        .route(
            "/api/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/api/projects", get(work::list_projects).post(work::create_project))
        .route(
            "/api/projects/{id}",
            get(work::get_project).put(work::update_project).delete(work::delete_project),
        )
        .route("/api/tasks", get(work::list_tasks).post(work::create_task))
        .route(
            "/api/tasks/{id}",
            get(work::get_task).put(work::update_task).delete(work::delete_task),
        )
        .route("/api/issues", get(work::list_issues).post(work::create_issue))
        .route(
            "/api/issues/{id}",
            get(work::get_issue).put(work::update_issue).delete(work::delete_issue),
        )
        .route("/api/task-statuses", get(work::list_task_statuses).post(work::create_task_status))
        .route(
            "/api/task-statuses/{id}",
            get(work::get_task_status).put(work::update_task_status).delete(work::delete_task_status),
        )
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Start the opsboard HTTP server bound to the given port over the given
/// document store root. Seeds the permission matrix, built-in roles and the
/// default admin on first run.
pub async fn run_with_port(http_port: u16, db_root: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(db_root)
        .with_context(|| format!("Failed to create or access store root: {}", db_root))?;
    let store = SharedStore::new(db_root)
        .with_context(|| format!("While opening document store with root: {}", db_root))?;
    crate::seed::ensure_seed_catalog(&store)
        .with_context(|| "While seeding the permission catalog")?;
    crate::seed::ensure_default_admin(&store)
        .with_context(|| "While ensuring the default admin user")?;

    let state = AppState {
        store,
        hub: Arc::new(RealtimeHub::new()),
        sessions: Arc::new(SessionManager::default()),
    };
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the default port (5000) and store root "data".
pub async fn run() -> anyhow::Result<()> {
    run_with_port(5000, "data").await
}
