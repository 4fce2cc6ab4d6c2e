//! In-process store used by the test suite and for running the server without PostgreSQL.

use crate::domain::category::{Category, NewCategory};
use crate::domain::conversation::ConversationKey;
use crate::domain::message::{Message, MessagePatch, NewMessage};
use crate::domain::user::{NewUser, User};
use crate::domain::video::{NewVideo, Video, VideoEdit, VideoFilter};
use crate::error::{AppError, Result};
use crate::services::health_service::Readiness;
use crate::services::repository::{CategoryRepository, MessageRepository, UserRepository, VideoRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug)]
struct StoredMessage {
    seq: u64,
    message: Message,
}

#[derive(Debug)]
struct StoredVideo {
    seq: u64,
    video: Video,
}

#[derive(Debug, Default)]
struct Inner {
    users: DashMap<Uuid, User>,
    // Unique indexes. A key is claimed through its entry before the user row is written.
    usernames: DashMap<String, Uuid>,
    google_ids: DashMap<String, Uuid>,
    messages: DashMap<Uuid, StoredMessage>,
    videos: DashMap<Uuid, StoredVideo>,
    categories: DashMap<Uuid, Category>,
    category_names: DashMap<String, Uuid>,
    seq: AtomicU64,
}

impl Inner {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

/// Claims `key` in `index` for `id`. Returns false if another id holds it.
fn claim(index: &DashMap<String, Uuid>, key: &str, id: Uuid) -> bool {
    match index.entry(key.to_string()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(id);
            true
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.messages.len()
    }

    #[must_use]
    pub fn video_count(&self) -> usize {
        self.inner.videos.len()
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<Message> {
        if !self.inner.users.contains_key(&message.from) || !self.inner.users.contains_key(&message.to) {
            return Err(AppError::NotFound);
        }

        let stored = Message {
            id: Uuid::new_v4(),
            conversation_key: message.conversation_key,
            from: message.from,
            to: message.to,
            content: message.content,
            read: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let seq = self.inner.next_seq();
        self.inner.messages.insert(stored.id, StoredMessage { seq, message: stored.clone() });
        Ok(stored)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.inner.messages.get(&id).map(|entry| entry.message.clone()))
    }

    async fn list_conversation(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let mut matching: Vec<(OffsetDateTime, u64, Message)> = self
            .inner
            .messages
            .iter()
            .filter(|entry| &entry.message.conversation_key == key)
            .map(|entry| (entry.message.created_at, entry.seq, entry.message.clone()))
            .collect();
        matching.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        Ok(matching.into_iter().map(|(_, _, message)| message).collect())
    }

    async fn update(&self, id: Uuid, patch: &MessagePatch) -> Result<Option<Message>> {
        Ok(self.inner.messages.get_mut(&id).map(|mut entry| {
            patch.apply(&mut entry.message);
            entry.message.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.messages.remove(&id).is_some())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let before = self.inner.messages.len();
        self.inner.messages.retain(|_, entry| !entry.message.involves(user_id));
        Ok((before - self.inner.messages.len()) as u64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();
        if !claim(&self.inner.usernames, &user.username, id) {
            return Err(AppError::Conflict(format!("User {} already exists", user.username)));
        }
        if !claim(&self.inner.google_ids, &user.google_id, id) {
            self.inner.usernames.remove(&user.username);
            return Err(AppError::Conflict(format!("User {} already exists", user.username)));
        }

        let created = User {
            id,
            google_id: user.google_id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            username: user.username,
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.users.get(&id).map(|entry| entry.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        Ok(ids.iter().filter_map(|id| self.inner.users.get(id).map(|entry| entry.clone())).collect())
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        let Some(id) = self.inner.google_ids.get(google_id).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.inner.users.get(&id).map(|entry| entry.clone()))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.inner.usernames.contains_key(username))
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.inner.users.iter().map(|entry| entry.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let needle = query.to_lowercase();
        let mut users: Vec<User> = self
            .inner
            .users
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle) || entry.username.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some((_, user)) = self.inner.users.remove(&id) else {
            return Ok(false);
        };
        self.inner.usernames.remove(&user.username);
        self.inner.google_ids.remove(&user.google_id);
        // Mirrors the cascades on the relational schema.
        self.inner.videos.retain(|_, entry| entry.video.uploader != id);
        for mut entry in self.inner.videos.iter_mut() {
            entry.video.liked_by.retain(|liker| *liker != id);
        }
        Ok(true)
    }
}

#[async_trait]
impl VideoRepository for MemoryStore {
    async fn create(&self, video: NewVideo) -> Result<Video> {
        if !self.inner.users.contains_key(&video.uploader) {
            return Err(AppError::NotFound);
        }

        let stored = Video {
            id: Uuid::new_v4(),
            title: video.title,
            description: video.description,
            category: video.category,
            subcategory: video.subcategory,
            url: video.url,
            thumbnail: video.thumbnail,
            uploader: video.uploader,
            liked_by: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        let seq = self.inner.next_seq();
        self.inner.videos.insert(stored.id, StoredVideo { seq, video: stored.clone() });
        Ok(stored)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Video>> {
        Ok(self.inner.videos.get(&id).map(|entry| entry.video.clone()))
    }

    async fn list(&self, filter: &VideoFilter) -> Result<Vec<Video>> {
        let mut matching: Vec<(OffsetDateTime, u64, Video)> = self
            .inner
            .videos
            .iter()
            .filter(|entry| filter.matches(&entry.video))
            .map(|entry| (entry.video.created_at, entry.seq, entry.video.clone()))
            .collect();
        matching.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        Ok(matching.into_iter().map(|(_, _, video)| video).collect())
    }

    async fn update(&self, id: Uuid, edit: &VideoEdit) -> Result<Option<Video>> {
        Ok(self.inner.videos.get_mut(&id).map(|mut entry| {
            edit.apply(&mut entry.video);
            entry.video.clone()
        }))
    }

    async fn set_liked(&self, id: Uuid, user_id: Uuid, liked: bool) -> Result<Option<Video>> {
        Ok(self.inner.videos.get_mut(&id).map(|mut entry| {
            let likers = &mut entry.video.liked_by;
            if liked {
                if !likers.contains(&user_id) {
                    likers.push(user_id);
                }
            } else {
                likers.retain(|liker| *liker != user_id);
            }
            entry.video.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.videos.remove(&id).is_some())
    }

    async fn delete_by_uploader(&self, user_id: Uuid) -> Result<Vec<String>> {
        let ids: Vec<Uuid> =
            self.inner.videos.iter().filter(|entry| entry.video.uploader == user_id).map(|entry| *entry.key()).collect();
        Ok(ids.into_iter().filter_map(|id| self.inner.videos.remove(&id)).map(|(_, entry)| entry.video.url).collect())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn create(&self, category: NewCategory) -> Result<Category> {
        let id = Uuid::new_v4();
        if !claim(&self.inner.category_names, &category.name, id) {
            return Err(AppError::Conflict(format!("Category {} already exists", category.name)));
        }

        let created = Category { id, name: category.name, subcategories: category.subcategories };
        self.inner.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.inner.categories.get(&id).map(|entry| entry.clone()))
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self.inner.categories.iter().map(|entry| entry.clone()).collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl Readiness for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
