use crate::domain::message::MessagePatch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConversationQuery {
    pub with: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateMessage {
    pub to: Option<String>,
    pub content: Option<String>,
}

/// Body of `PATCH /messages/{id}`. Participants, key and timestamps are immutable, so any
/// field other than `read` and `content` is rejected.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessage {
    pub read: Option<bool>,
    pub content: Option<String>,
}

impl From<UpdateMessage> for MessagePatch {
    fn from(body: UpdateMessage) -> Self {
        Self { read: body.read, content: body.content }
    }
}
