use crate::domain::conversation::ConversationKey;
use crate::domain::user::UserSummary;
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored direct message. `from`, `to` and `conversation_key` never change once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_key: ConversationKey,
    pub from: Uuid,
    pub to: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from == user_id || self.to == user_id
    }
}

/// A message with sender and recipient expanded to their public projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_key: ConversationKey,
    pub from: UserSummary,
    pub to: UserSummary,
    pub content: String,
    pub read: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_key: ConversationKey,
    pub from: Uuid,
    pub to: Uuid,
    pub content: String,
}

/// The mutable subset of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub read: Option<bool>,
    pub content: Option<String>,
}

impl MessagePatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.read.is_none() && self.content.is_none()
    }

    pub(crate) fn apply(&self, message: &mut Message) {
        if let Some(read) = self.read {
            message.read = read;
        }
        if let Some(content) = &self.content {
            message.content.clone_from(content);
        }
    }
}

/// An inbound `private_message` gateway event.
#[derive(Debug, Clone, Default)]
pub struct PrivateMessage {
    pub to: Option<String>,
    pub content: Option<String>,
}

/// Outcome of one realtime send, reported back to the originating connection.
#[derive(Debug, Clone)]
pub enum SendAck {
    Sent(MessageView),
    Failed(String),
}

impl SendAck {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}
