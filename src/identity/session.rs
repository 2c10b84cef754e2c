//! Session table: opaque bearer tokens mapped to trusted principals. Each
//! `SessionManager` owns its own state; revocation is simply removal, so the
//! table never outgrows the set of live sessions.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

// 256-bit random token base64url without padding
fn gen_id() -> AppResult<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AppError::internal("token_entropy".to_string(), e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    user_index: RwLock<HashMap<Uuid, HashSet<SessionToken>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(30 * 24 * 60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), user_index: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, principal: Principal) -> AppResult<Session> {
        let now = Instant::now();
        let sid = gen_id()?;
        let token = gen_id()?;
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token.clone(), sess.clone());
        self.user_index
            .write()
            .entry(principal.user_id)
            .or_default()
            .insert(token);
        tprintln!("session.issue user={} sid={} ttl_secs={}", principal.user_id, sid, self.ttl.as_secs());
        Ok(sess)
    }

    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(sess) if sess.expires_at > now => return Some(sess.principal.clone()),
                Some(_) => true,
                None => false,
            }
        };
        // Expired entries are dropped on first sight
        if expired {
            self.drop_token(token);
        }
        None
    }

    pub fn logout(&self, token: &str) -> bool {
        self.drop_token(token)
    }

    /// Drop every live session for the given user (used when the user record
    /// is deleted). Returns the number of sessions revoked.
    pub fn revoke_user(&self, user_id: &Uuid) -> usize {
        let tokens = self.user_index.write().remove(user_id).unwrap_or_default();
        let mut count = 0usize;
        let mut sessions = self.sessions.write();
        for t in &tokens {
            if sessions.remove(t).is_some() { count += 1; }
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }

    fn drop_token(&self, token: &str) -> bool {
        let Some(sess) = self.sessions.write().remove(token) else {
            return false;
        };
        let uid = sess.principal.user_id;
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(&uid) {
            set.remove(token);
            if set.is_empty() { idx.remove(&uid); }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal { user_id: Uuid::new_v4(), username: "alice".into() }
    }

    #[test]
    fn issue_then_validate() {
        let sm = SessionManager::default();
        let p = principal();
        let sess = sm.issue(p.clone()).unwrap();
        assert_eq!(sm.validate(&sess.token), Some(p));
    }

    #[test]
    fn logout_invalidates_token() {
        let sm = SessionManager::default();
        let sess = sm.issue(principal()).unwrap();
        assert!(sm.logout(&sess.token));
        assert_eq!(sm.validate(&sess.token), None);
        assert!(!sm.logout(&sess.token));
    }

    #[test]
    fn revoke_user_drops_all_sessions() {
        let sm = SessionManager::default();
        let p = principal();
        let s1 = sm.issue(p.clone()).unwrap();
        let s2 = sm.issue(p.clone()).unwrap();
        assert_eq!(sm.revoke_user(&p.user_id), 2);
        assert_eq!(sm.validate(&s1.token), None);
        assert_eq!(sm.validate(&s2.token), None);
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let sm = SessionManager::new(Duration::from_secs(0));
        let sess = sm.issue(principal()).unwrap();
        assert_eq!(sm.validate(&sess.token), None);
        // The expired entry is dropped, not retained
        assert!(!sm.logout(&sess.token));
    }

    #[test]
    fn managers_do_not_share_session_state() {
        let a = SessionManager::default();
        let b = SessionManager::default();
        let sess = a.issue(principal()).unwrap();
        assert!(a.validate(&sess.token).is_some());
        assert_eq!(b.validate(&sess.token), None);
    }
}
