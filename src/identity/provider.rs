//! Login provider: verifies credentials against the user store and issues a
//! session with the resolved permission set attached for the client.

use crate::error::{AppError, AppResult};
use crate::model::User;
use crate::security;
use crate::store::Store;
use crate::tprintln;

use super::principal::Principal;
use super::resolver::{resolve, ResolvedPermissions};
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub user: User,
    pub permissions: ResolvedPermissions,
}

/// Authenticate and issue a session. The flattened permission set is resolved
/// live so the client starts from current catalog state.
pub fn login(store: &Store, sm: &SessionManager, req: &LoginRequest) -> AppResult<LoginResponse> {
    let Some(user) = store.find_user_by_username(&req.username) else {
        // Same error for unknown user and bad password
        return Err(AppError::auth("invalid_credentials", "invalid username or password"));
    };
    if !security::verify_password(&user.password_hash, &req.password) {
        return Err(AppError::auth("invalid_credentials", "invalid username or password"));
    }

    let permissions = resolve(store, &user);
    let principal = Principal { user_id: user.id, username: user.username.clone() };
    let session = sm.issue(principal)?;
    tprintln!("auth.login user={} sid={}", user.username, session.session_id);
    Ok(LoginResponse { session, user, permissions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PermissionRef, Role};
    use crate::store::SharedStore;
    use tempfile::tempdir;

    #[test]
    fn login_positive_and_negative() {
        let tmp = tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let role = Role::new("staff", vec![PermissionRef::Slug("tasks_read".into())]);
        let role_id = role.id;
        store.roles.put(role).unwrap();
        let hash = security::hash_password("s3cr3t!").unwrap();
        let user = User::new("Alice", "alice", "alice@example.com", hash, Some(role_id));
        store.users.put(user).unwrap();
        let sm = SessionManager::default();

        let bad = login(&store, &sm, &LoginRequest { username: "alice".into(), password: "wrong".into() });
        assert!(bad.is_err(), "login with wrong password must fail");

        let missing = login(&store, &sm, &LoginRequest { username: "bob".into(), password: "s3cr3t!".into() });
        assert!(missing.is_err(), "login with unknown user must fail");

        let ok = login(&store, &sm, &LoginRequest { username: "alice".into(), password: "s3cr3t!".into() })
            .expect("login with correct password should succeed");
        assert_eq!(ok.permissions.to_wire(), vec!["tasks_read".to_string()]);
        assert_eq!(sm.validate(&ok.session.token).unwrap().username, "alice");
    }
}
