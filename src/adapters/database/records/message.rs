use crate::domain::conversation::ConversationKey;
use crate::domain::message::Message;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) conversation_key: String,
    pub(crate) sender_id: Uuid,
    pub(crate) recipient_id: Uuid,
    pub(crate) content: String,
    pub(crate) read: bool,
    pub(crate) created_at: OffsetDateTime,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            conversation_key: ConversationKey::from_stored(record.conversation_key),
            from: record.sender_id,
            to: record.recipient_id,
            content: record.content,
            read: record.read,
            created_at: record.created_at,
        }
    }
}
