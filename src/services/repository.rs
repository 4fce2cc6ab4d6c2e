use crate::domain::category::{Category, NewCategory};
use crate::domain::conversation::ConversationKey;
use crate::domain::message::{Message, MessagePatch, NewMessage};
use crate::domain::user::{NewUser, User};
use crate::domain::video::{NewVideo, Video, VideoEdit, VideoFilter};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait MessageRepository: Send + Sync + std::fmt::Debug {
    /// Persists a new message with `read = false` and the current time as `created_at`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the sender or recipient does not exist.
    async fn create(&self, message: NewMessage) -> Result<Message>;

    async fn find(&self, id: Uuid) -> Result<Option<Message>>;

    /// Every message carrying `key`, oldest first.
    async fn list_conversation(&self, key: &ConversationKey) -> Result<Vec<Message>>;

    /// Applies `patch` and returns the updated message, or `None` if it does not exist.
    async fn update(&self, id: Uuid, patch: &MessagePatch) -> Result<Option<Message>>;

    /// Returns whether a message was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Removes every message the user sent or received.
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the Google id or username is already taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>>;

    async fn username_exists(&self, username: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<User>>;

    /// Case-insensitive substring match over name and username.
    async fn search(&self, query: &str) -> Result<Vec<User>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait VideoRepository: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::NotFound` if the uploader does not exist.
    async fn create(&self, video: NewVideo) -> Result<Video>;

    async fn find(&self, id: Uuid) -> Result<Option<Video>>;

    /// Videos matching `filter`, newest first.
    async fn list(&self, filter: &VideoFilter) -> Result<Vec<Video>>;

    async fn update(&self, id: Uuid, edit: &VideoEdit) -> Result<Option<Video>>;

    /// Adds or removes `user_id` from the likers. Liking twice counts once.
    async fn set_liked(&self, id: Uuid, user_id: Uuid, liked: bool) -> Result<Option<Video>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Removes every video the user uploaded and returns their media URLs.
    async fn delete_by_uploader(&self, user_id: Uuid) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the name is already taken.
    async fn create(&self, category: NewCategory) -> Result<Category>;

    async fn find(&self, id: Uuid) -> Result<Option<Category>>;

    /// Every category, ordered by name.
    async fn list(&self) -> Result<Vec<Category>>;
}
