#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::{
    DbPool, PgCategoryRepository, PgMessageRepository, PgReadiness, PgUserRepository, PgVideoRepository,
};
use crate::adapters::media::{ExternalMedia, MediaStore};
use crate::adapters::memory::MemoryStore;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::auth_service::AuthService;
use crate::services::category_service::CategoryService;
use crate::services::gateway::GatewayService;
use crate::services::gateway::flow::MessageFlow;
use crate::services::gateway::registry::SessionRegistry;
use crate::services::health_service::{HealthService, Readiness};
use crate::services::message_service::MessageService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::repository::{CategoryRepository, MessageRepository, UserRepository, VideoRepository};
use crate::services::user_service::UserService;
use crate::services::video_service::VideoService;
use crate::workers::RoomGcWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use crate::adapters::database::{init_pool, run_migrations};

/// The persistence backends the services run against.
#[derive(Clone, Debug)]
pub struct Storage {
    pub messages: Arc<dyn MessageRepository>,
    pub users: Arc<dyn UserRepository>,
    pub videos: Arc<dyn VideoRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub media: Arc<dyn MediaStore>,
    pub readiness: Arc<dyn Readiness>,
}

impl Storage {
    #[must_use]
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            videos: Arc::new(PgVideoRepository::new(pool.clone())),
            categories: Arc::new(PgCategoryRepository::new(pool.clone())),
            media: Arc::new(ExternalMedia),
            readiness: Arc::new(PgReadiness::new(pool)),
        }
    }

    #[must_use]
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            messages: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            videos: Arc::new(store.clone()),
            categories: Arc::new(store.clone()),
            media: Arc::new(ExternalMedia),
            readiness: Arc::new(store),
        }
    }

    /// Replaces the media backend, e.g. with a CDN client.
    #[must_use]
    pub fn with_media(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = media;
        self
    }
}

#[derive(Debug)]
pub struct Workers {
    room_gc: RoomGcWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.room_gc.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    storage: Option<Storage>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, storage: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.storage = Some(Storage::postgres(pool));
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Wires repositories, services and background workers.
    ///
    /// # Errors
    /// Returns an error if no storage backend was configured.
    pub fn build(self) -> anyhow::Result<App> {
        let Self { config, storage } = self;
        let storage = storage.ok_or_else(|| anyhow::anyhow!("No storage backend configured"))?;

        let registry = SessionRegistry::new(config.gateway.room_capacity);
        let auth_service = AuthService::new(config.auth.clone());
        let message_service =
            MessageService::new(storage.messages.clone(), storage.users.clone(), config.messaging.clone());
        let video_service = VideoService::new(storage.videos, storage.users.clone(), storage.media);
        let category_service = CategoryService::new(storage.categories);
        let user_service = UserService::new(
            storage.users,
            storage.messages,
            video_service.clone(),
            auth_service.clone(),
            registry.clone(),
        );
        let flow = MessageFlow::new(message_service.clone(), registry.clone());
        let rate_limit_service =
            RateLimitService::new(config.server.trusted_proxies.clone(), config.gateway.clone());
        let gateway_service =
            GatewayService::new(flow, registry.clone(), rate_limit_service.clone(), config.gateway.clone());
        let health_service = HealthService::new(storage.readiness, config.health.clone());

        Ok(App {
            services: ServiceContainer {
                auth_service,
                message_service,
                user_service,
                video_service,
                category_service,
                gateway_service,
                rate_limit_service,
            },
            health_service,
            workers: Workers { room_gc: RoomGcWorker::new(registry, config.gateway) },
        })
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received, draining connections");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through `tracing` so they reach the configured log sink.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(panic.location = %location, panic.payload = %payload, "Panic occurred");
        default_hook(info);
    }));
}
