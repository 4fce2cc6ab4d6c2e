use crate::domain::video::Video;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub username: String,
    pub created_at: OffsetDateTime,
}

/// The public projection of a user embedded in messages and search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self { id: user.id, name: user.name.clone(), username: user.username.clone(), avatar: user.avatar.clone() }
    }
}

/// A user with the videos they uploaded, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user: User,
    pub videos: Vec<Video>,
}

/// Fields needed to persist a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub username: String,
}

/// Profile returned by the Google OAuth exchange.
#[derive(Debug, Clone, Default)]
pub struct GoogleProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
}

/// Reduces a display name (or the local part of an email) to a username base:
/// lowercase ASCII letters and digits only.
#[must_use]
pub fn username_base(name: &str, email: &str) -> String {
    let source = if name.trim().is_empty() { email.split('@').next().unwrap_or_default() } else { name };
    source.to_lowercase().chars().filter(char::is_ascii_alphanumeric).collect()
}
