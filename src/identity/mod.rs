//! Central identity handling: session management, login, permission
//! resolution and the request-time authorization gate.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod resolver;
mod authorizer;

pub use principal::Principal;
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{login, LoginRequest, LoginResponse};
pub use resolver::{resolve, ResolvedPermissions};
pub use authorizer::{authorize, Decision, DenyReason};
