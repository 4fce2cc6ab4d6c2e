use crate::config::MessagingConfig;
use crate::domain::auth::Identity;
use crate::domain::conversation::ConversationKey;
use crate::domain::message::{Message, MessagePatch, MessageView, NewMessage};
use crate::domain::user::UserSummary;
use crate::error::{AppError, Result};
use crate::services::repository::{MessageRepository, UserRepository};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    conversation_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            sent_total: meter
                .u64_counter("reeltalk_messages_sent_total")
                .with_description("Total message create attempts by outcome")
                .build(),
            conversation_size: meter
                .u64_histogram("reeltalk_conversation_fetch_size")
                .with_description("Number of messages returned by a conversation listing")
                .build(),
        }
    }
}

/// Parses a user or message id supplied by a client.
///
/// # Errors
/// Returns `AppError::BadRequest` if `raw` is not a valid id.
pub fn parse_id(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid \"{field}\" id")))
}

#[derive(Clone, Debug)]
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        config: MessagingConfig,
    ) -> Self {
        Self { messages, users, config, metrics: Metrics::new() }
    }

    /// Lists the conversation between the caller and `with`, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if `with` is missing or not a valid id.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn list_conversation(&self, caller: &Identity, with: Option<&str>) -> Result<Vec<MessageView>> {
        let other = match with.map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_id(raw, "with")?,
            _ => return Err(AppError::BadRequest("Missing \"with\" query param".to_string())),
        };

        let key = ConversationKey::between(caller.id, other);
        let messages = self.messages.list_conversation(&key).await?;
        self.metrics.conversation_size.record(messages.len() as u64, &[]);

        self.expand(messages).await
    }

    /// Stores a new message from the caller to `to`.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if `to` or `content` is missing, empty or invalid.
    /// Returns `AppError::NotFound` if the recipient does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, caller, content), fields(user_id = %caller.id))]
    pub async fn create_message(
        &self,
        caller: &Identity,
        to: Option<&str>,
        content: Option<&str>,
    ) -> Result<MessageView> {
        let (Some(to), Some(content)) = (to.filter(|t| !t.trim().is_empty()), content.filter(|c| !c.is_empty()))
        else {
            return Err(AppError::BadRequest("Invalid payload: \"to\" and \"content\" are required".to_string()));
        };
        let recipient = parse_id(to, "to")?;
        self.check_length(content)?;

        let new_message = NewMessage {
            conversation_key: ConversationKey::between(caller.id, recipient),
            from: caller.id,
            to: recipient,
            content: content.to_string(),
        };

        match self.messages.create(new_message).await {
            Ok(message) => {
                tracing::debug!(message_id = %message.id, "Message stored");
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                let mut views = self.expand(vec![message]).await?;
                views.pop().ok_or(AppError::Internal)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if ownership is enforced and the caller is not a participant.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn get_message(&self, caller: &Identity, id: Uuid) -> Result<Message> {
        let message = self.messages.find(id).await?.ok_or(AppError::NotFound)?;
        self.authorize(caller, &message)?;
        Ok(message)
    }

    /// Applies `patch` to a message. Only `read` and `content` are mutable.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the patch sets an empty or oversized content.
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if ownership is enforced and the caller is not a participant.
    #[tracing::instrument(err(level = "warn"), skip(self, caller, patch), fields(user_id = %caller.id))]
    pub async fn update_message(&self, caller: &Identity, id: Uuid, patch: MessagePatch) -> Result<Message> {
        if let Some(content) = &patch.content {
            if content.is_empty() {
                return Err(AppError::BadRequest("Message content cannot be empty".to_string()));
            }
            self.check_length(content)?;
        }

        let existing = self.get_message(caller, id).await?;
        if patch.is_empty() {
            return Ok(existing);
        }

        self.messages.update(id, &patch).await?.ok_or(AppError::NotFound)
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if ownership is enforced and the caller is not a participant.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn delete_message(&self, caller: &Identity, id: Uuid) -> Result<()> {
        self.get_message(caller, id).await?;
        if self.messages.delete(id).await? { Ok(()) } else { Err(AppError::NotFound) }
    }

    fn authorize(&self, caller: &Identity, message: &Message) -> Result<()> {
        if self.config.enforce_ownership && !message.involves(caller.id) {
            tracing::warn!(message_id = %message.id, "Caller is not a participant of the message");
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    fn check_length(&self, content: &str) -> Result<()> {
        if content.chars().count() > self.config.max_content_length {
            return Err(AppError::BadRequest(format!(
                "Message content exceeds {} characters",
                self.config.max_content_length
            )));
        }
        Ok(())
    }

    async fn expand(&self, messages: Vec<Message>) -> Result<Vec<MessageView>> {
        let mut ids: Vec<Uuid> = messages.iter().flat_map(|m| [m.from, m.to]).collect();
        ids.sort_unstable();
        ids.dedup();

        let users: HashMap<Uuid, UserSummary> =
            self.users.find_many(&ids).await?.iter().map(|u| (u.id, UserSummary::from(u))).collect();

        messages
            .into_iter()
            .map(|m| {
                let from = users.get(&m.from).cloned().ok_or(AppError::NotFound)?;
                let to = users.get(&m.to).cloned().ok_or(AppError::NotFound)?;
                Ok(MessageView {
                    id: m.id,
                    conversation_key: m.conversation_key,
                    from,
                    to,
                    content: m.content,
                    read: m.read,
                    created_at: m.created_at,
                })
            })
            .collect()
    }
}
