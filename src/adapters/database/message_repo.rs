use crate::adapters::database::records::MessageRecord;
use crate::adapters::database::{DbPool, FOREIGN_KEY_VIOLATION, is_violation};
use crate::domain::conversation::ConversationKey;
use crate::domain::message::{Message, MessagePatch, NewMessage};
use crate::error::{AppError, Result};
use crate::services::repository::MessageRepository;
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, conversation_key, sender_id, recipient_id, content, read, created_at";

#[derive(Clone, Debug)]
pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[tracing::instrument(level = "debug", skip(self, message), fields(conversation_key = %message.conversation_key))]
    async fn create(&self, message: NewMessage) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            INSERT INTO messages (id, conversation_key, sender_id, recipient_id, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(message.conversation_key.as_str())
        .bind(message.from)
        .bind(message.to)
        .bind(message.content)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            // sender or recipient does not exist
            Err(e) if is_violation(&e, FOREIGN_KEY_VIOLATION) => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!("SELECT {COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), fields(conversation_key = %key))]
    async fn list_conversation(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM messages
            WHERE conversation_key = $1
            ORDER BY created_at ASC, seq ASC
            "
        ))
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, patch))]
    async fn update(&self, id: Uuid, patch: &MessagePatch) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            UPDATE messages
            SET read = COALESCE($2, read),
                content = COALESCE($3, content)
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.read)
        .bind(patch.content.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE sender_id = $1 OR recipient_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
