use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller an authenticated request or connection acts on behalf of.
///
/// Bound once when the credential is verified and passed by reference into every
/// downstream operation; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self { id: claims.id, email: claims.email }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: u64,
}
