use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The trusted identity attached to a validated session. Authorization
/// consumes only the user id; credentials are never re-verified per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}
