/// Authenticated caller
///
/// The HTTP layer validates the bearer token and inserts this into the request
/// extensions; services receive the caller id from it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::Claims;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Email as of token issue; services re-read it from the store when it
    /// matters (invitation matching).
    pub email: String,
}

impl AuthContext {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}
