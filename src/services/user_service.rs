use crate::domain::auth::{AuthSession, Identity};
use crate::domain::user::{GoogleProfile, NewUser, User, UserProfile, UserSummary, username_base};
use crate::error::{AppError, Result};
use crate::services::auth_service::AuthService;
use crate::services::gateway::registry::SessionRegistry;
use crate::services::repository::{MessageRepository, UserRepository};
use crate::services::video_service::VideoService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_NAME: &str = "Unknown Name";
const DEFAULT_EMAIL: &str = "no-email@example.com";
const FALLBACK_USERNAME: &str = "user";
const MAX_SIGN_IN_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
struct Metrics {
    sign_ins_total: Counter<u64>,
    deleted_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            sign_ins_total: meter
                .u64_counter("reeltalk_sign_ins_total")
                .with_description("Google sign-ins by whether the account was new")
                .build(),
            deleted_total: meter.u64_counter("reeltalk_users_deleted_total").with_description("Total accounts deleted").build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    video_service: VideoService,
    auth_service: AuthService,
    registry: SessionRegistry,
    metrics: Metrics,
}

impl UserService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
        video_service: VideoService,
        auth_service: AuthService,
        registry: SessionRegistry,
    ) -> Self {
        Self { users, messages, video_service, auth_service, registry, metrics: Metrics::new() }
    }

    /// Finds or creates the account for a Google profile and issues an access token.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if a unique username could not be claimed after repeated races.
    #[tracing::instrument(err, skip(self, profile))]
    pub async fn sign_in_google(&self, profile: GoogleProfile) -> Result<(User, AuthSession)> {
        if let Some(user) = self.users.find_by_google_id(&profile.id).await? {
            self.metrics.sign_ins_total.add(1, &[KeyValue::new("account", "existing")]);
            let session = self.auth_service.issue(&user)?;
            return Ok((user, session));
        }

        let display_name = profile.display_name.as_deref().map(str::trim).unwrap_or_default();
        let email = profile.email.as_deref().filter(|e| !e.trim().is_empty()).unwrap_or(DEFAULT_EMAIL);
        let name = if display_name.is_empty() { DEFAULT_NAME } else { display_name };

        let mut attempt = 0;
        let user = loop {
            attempt += 1;
            let username = self.unique_username(display_name, email).await?;
            let new_user = NewUser {
                google_id: profile.id.clone(),
                name: name.to_string(),
                email: email.to_string(),
                avatar: profile.photo.clone().filter(|p| !p.is_empty()),
                username,
            };

            match self.users.create(new_user).await {
                Ok(user) => break user,
                // Another sign-in claimed the username or Google id first.
                Err(AppError::Conflict(reason)) if attempt < MAX_SIGN_IN_ATTEMPTS => {
                    tracing::debug!(attempt, reason = %reason, "Sign-in raced, retrying");
                    if let Some(user) = self.users.find_by_google_id(&profile.id).await? {
                        break user;
                    }
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(user_id = %user.id, username = %user.username, "Account created");
        self.metrics.sign_ins_total.add(1, &[KeyValue::new("account", "new")]);
        let session = self.auth_service.issue(&user)?;
        Ok((user, session))
    }

    /// The user's profile with the videos they uploaded.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    pub async fn get_user(&self, _caller: &Identity, id: Uuid) -> Result<UserProfile> {
        let user = self.users.find(id).await?.ok_or(AppError::NotFound)?;
        let videos = self.video_service.uploaded_by(id).await?;
        Ok(UserProfile { user, videos })
    }

    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn list_users(&self, _caller: &Identity) -> Result<Vec<User>> {
        self.users.list().await
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if the query is missing or blank.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn search_users(&self, caller: &Identity, query: Option<&str>) -> Result<Vec<UserSummary>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty()).ok_or_else(|| {
            AppError::BadRequest("Query missing".to_string())
        })?;
        Ok(self.users.search(query).await?.iter().map(UserSummary::from).collect())
    }

    /// Deletes the caller's account with their videos and every message they sent or received,
    /// then closes their live gateway connections.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if `id` is not the caller.
    /// Returns `AppError::NotFound` if the user does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn delete_user(&self, caller: &Identity, id: Uuid) -> Result<()> {
        if caller.id != id {
            return Err(AppError::Forbidden);
        }

        if self.users.find(id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let videos_removed = self.video_service.remove_uploads(id).await?;
        let messages_removed = self.messages.delete_for_user(id).await?;
        if !self.users.delete(id).await? {
            return Err(AppError::NotFound);
        }

        let closed = self.registry.disconnect_user(id);
        self.metrics.deleted_total.add(1, &[]);
        tracing::info!(videos_removed, messages_removed, connections_closed = closed, "Account deleted");
        Ok(())
    }

    async fn unique_username(&self, name: &str, email: &str) -> Result<String> {
        let mut base = username_base(name, email);
        if base.is_empty() {
            base = FALLBACK_USERNAME.to_string();
        }

        let mut candidate = base.clone();
        let mut counter = 1u64;
        while self.users.username_exists(&candidate).await? {
            candidate = format!("{base}{counter}");
            counter += 1;
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::media::ExternalMedia;
    use crate::adapters::memory::MemoryStore;
    use crate::config::AuthConfig;
    use crate::domain::video::VideoDraft;
    use crate::domain::conversation::ConversationKey;
    use crate::domain::message::NewMessage;
    use crate::services::gateway::registry::RoomEvent;

    fn videos(store: &MemoryStore) -> VideoService {
        VideoService::new(Arc::new(store.clone()), Arc::new(store.clone()), Arc::new(ExternalMedia))
    }

    fn setup() -> (UserService, MemoryStore, SessionRegistry) {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new(8);
        let auth = AuthService::new(AuthConfig { jwt_secret: "secret".into(), token_ttl_secs: 10_800, exchange_secret: None });
        let service =
            UserService::new(Arc::new(store.clone()), Arc::new(store.clone()), videos(&store), auth, registry.clone());
        (service, store, registry)
    }

    fn profile(id: &str, name: Option<&str>, email: Option<&str>) -> GoogleProfile {
        GoogleProfile {
            id: id.to_string(),
            display_name: name.map(str::to_string),
            email: email.map(str::to_string),
            photo: None,
        }
    }

    fn identity(user: &User) -> Identity {
        Identity { id: user.id, email: user.email.clone() }
    }

    #[tokio::test]
    async fn test_sign_in_creates_then_reuses_account() {
        let (service, _, _) = setup();
        let (first, _) = service.sign_in_google(profile("g1", Some("Sara Ali"), Some("sara@example.com"))).await.unwrap();
        let (second, session) =
            service.sign_in_google(profile("g1", Some("Someone Else"), Some("x@example.com"))).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "saraali");
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn test_usernames_are_suffixed_until_unique() {
        let (service, _, _) = setup();
        let mut usernames = Vec::new();
        for i in 0..3 {
            let (user, _) =
                service.sign_in_google(profile(&format!("g{i}"), Some("Bob"), Some("bob@example.com"))).await.unwrap();
            usernames.push(user.username);
        }
        assert_eq!(usernames, vec!["bob", "bob1", "bob2"]);
    }

    #[tokio::test]
    async fn test_missing_profile_fields_get_defaults() {
        let (service, _, _) = setup();
        let (user, _) = service.sign_in_google(profile("g1", None, None)).await.unwrap();
        assert_eq!(user.name, "Unknown Name");
        assert_eq!(user.email, "no-email@example.com");
        assert_eq!(user.username, "noemail");

        let (user, _) = service.sign_in_google(profile("g2", Some("!!!"), Some("@example.com"))).await.unwrap();
        assert_eq!(user.username, "user");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (service, _, _) = setup();
        let (alice, _) = service.sign_in_google(profile("g1", Some("Alice"), None)).await.unwrap();
        service.sign_in_google(profile("g2", Some("Bob"), None)).await.unwrap();
        let caller = identity(&alice);

        assert!(matches!(service.search_users(&caller, None).await, Err(AppError::BadRequest(_))));
        assert!(matches!(service.search_users(&caller, Some("  ")).await, Err(AppError::BadRequest(_))));

        let found = service.search_users(&caller, Some("ALI")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "alice");
    }

    #[tokio::test]
    async fn test_delete_user_is_self_only_and_removes_messages_and_videos() {
        let (service, store, registry) = setup();
        let (alice, _) = service.sign_in_google(profile("g1", Some("Alice"), None)).await.unwrap();
        let (bob, _) = service.sign_in_google(profile("g2", Some("Bob"), None)).await.unwrap();
        MessageRepository::create(
            &store,
            NewMessage {
                conversation_key: ConversationKey::between(alice.id, bob.id),
                from: alice.id,
                to: bob.id,
                content: "hi".into(),
            },
        )
        .await
        .unwrap();
        let clip = VideoDraft {
            title: Some("clip".into()),
            category: Some("Games".into()),
            subcategory: Some("PUBG".into()),
            url: Some("https://cdn.example.com/clip.mp4".into()),
            ..VideoDraft::default()
        };
        videos(&store).publish(&identity(&alice), clip).await.unwrap();
        let profile = service.get_user(&identity(&bob), alice.id).await.unwrap();
        assert_eq!(profile.videos.len(), 1);
        let mut alice_conn = registry.join(alice.id);

        assert!(matches!(service.delete_user(&identity(&bob), alice.id).await, Err(AppError::Forbidden)));

        service.delete_user(&identity(&alice), alice.id).await.unwrap();
        assert_eq!(store.message_count(), 0);
        assert_eq!(store.video_count(), 0);
        assert!(matches!(service.get_user(&identity(&bob), alice.id).await, Err(AppError::NotFound)));
        assert!(matches!(alice_conn.recv().await, Ok(RoomEvent::Disconnect)));
        assert!(matches!(service.delete_user(&identity(&alice), alice.id).await, Err(AppError::NotFound)));
    }
}
