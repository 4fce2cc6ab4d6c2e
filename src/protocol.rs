//! JSON wire formats shared by the REST API and the realtime gateway.

use crate::domain::auth::AuthSession;
use crate::domain::category::Category;
use crate::domain::message::{Message, MessageView, PrivateMessage, SendAck};
use crate::domain::user::{User, UserProfile, UserSummary};
use crate::domain::video::{Video, VideoView};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const EVENT_PRIVATE_MESSAGE: &str = "private_message";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<UserSummary> for UserSummaryDto {
    fn from(summary: UserSummary) -> Self {
        Self { id: summary.id, name: summary.name, username: summary.username, avatar: summary.avatar }
    }
}

impl From<&User> for UserSummaryDto {
    fn from(user: &User) -> Self {
        UserSummary::from(user).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserProfileDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

/// A profile together with the user's uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserDetailDto {
    #[serde(flatten)]
    pub profile: UserProfileDto,
    pub videos: Vec<VideoRecordDto>,
}

impl From<UserProfile> for UserDetailDto {
    fn from(profile: UserProfile) -> Self {
        Self {
            profile: profile.user.into(),
            videos: profile.videos.into_iter().map(VideoRecordDto::from).collect(),
        }
    }
}

/// Returned by a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSessionDto {
    pub user: UserProfileDto,
    pub token: String,
    /// Unix seconds.
    pub expires_at: u64,
}

impl AuthSessionDto {
    #[must_use]
    pub fn new(user: User, session: AuthSession) -> Self {
        Self { user: user.into(), token: session.token, expires_at: session.expires_at }
    }
}

/// A video with its uploader expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub uploader: UserSummaryDto,
    pub likes: usize,
    pub liked_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<VideoView> for VideoDto {
    fn from(view: VideoView) -> Self {
        let VideoView { video, uploader } = view;
        Self {
            id: video.id,
            likes: video.likes(),
            title: video.title,
            description: video.description,
            category: video.category,
            subcategory: video.subcategory,
            url: video.url,
            thumbnail: video.thumbnail,
            uploader: uploader.into(),
            liked_by: video.liked_by,
            created_at: video.created_at,
        }
    }
}

/// A video as stored, with the uploader as an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecordDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub uploader: Uuid,
    pub likes: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Video> for VideoRecordDto {
    fn from(video: Video) -> Self {
        Self {
            id: video.id,
            likes: video.likes(),
            title: video.title,
            description: video.description,
            category: video.category,
            subcategory: video.subcategory,
            url: video.url,
            thumbnail: video.thumbnail,
            uploader: video.uploader,
            created_at: video.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryDto {
    pub id: Uuid,
    pub name: String,
    pub subcategories: Vec<String>,
}

impl From<Category> for CategoryDto {
    fn from(category: Category) -> Self {
        Self { id: category.id, name: category.name, subcategories: category.subcategories }
    }
}

/// A message with sender and recipient expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_key: String,
    pub from: UserSummaryDto,
    pub to: UserSummaryDto,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<MessageView> for MessageDto {
    fn from(view: MessageView) -> Self {
        Self {
            id: view.id,
            conversation_key: view.conversation_key.to_string(),
            from: view.from.into(),
            to: view.to.into(),
            content: view.content,
            read: view.read,
            created_at: view.created_at,
        }
    }
}

/// A message as stored, with participants as ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecordDto {
    pub id: Uuid,
    pub conversation_key: String,
    pub from: Uuid,
    pub to: Uuid,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Message> for MessageRecordDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_key: message.conversation_key.to_string(),
            from: message.from,
            to: message.to,
            content: message.content,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

/// An inbound gateway frame. `data` is decoded according to `event`.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateMessagePayload {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl From<PrivateMessagePayload> for PrivateMessage {
    fn from(payload: PrivateMessagePayload) -> Self {
        Self { to: payload.to, content: payload.content }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckDto {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckDto {
    #[must_use]
    pub fn new(id: u64, ack: SendAck) -> Self {
        match ack {
            SendAck::Sent(view) => Self { id, success: true, message: Some(view.into()), error: None },
            SendAck::Failed(error) => Self { id, success: false, message: None, error: Some(error) },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDto {
    pub error: String,
}

/// An outbound gateway frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A message addressed to this user.
    Message(MessageDto),
    /// Confirms a message this connection sent has been stored and fanned out.
    MessageSent(MessageDto),
    Ack(AckDto),
    Error(ErrorDto),
}

impl ServerFrame {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorDto { error: message.into() })
    }
}
