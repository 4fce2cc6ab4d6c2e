use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Joins the two sorted participant ids. Never appears in a hyphenated UUID.
pub const SEPARATOR: char = '_';

/// Identifies the direct-message thread between an unordered pair of users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    #[must_use]
    pub fn between(a: Uuid, b: Uuid) -> Self {
        conversation_key(&a.hyphenated().to_string(), &b.hyphenated().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds a key read back from storage.
    #[must_use]
    pub(crate) const fn from_stored(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the conversation key for two participants, in either order.
#[must_use]
pub fn conversation_key(a: &str, b: &str) -> ConversationKey {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    ConversationKey(format!("{first}{SEPARATOR}{second}"))
}
