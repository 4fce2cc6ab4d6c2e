pub mod message_repo;
pub mod records;
pub mod user_repo;
pub mod video_repo;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::services::health_service::Readiness;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub use message_repo::PgMessageRepository;
pub use user_repo::PgUserRepository;
pub use video_repo::{PgCategoryRepository, PgVideoRepository};

pub type DbPool = Pool<Postgres>;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

/// Initializes the database connection pool, retrying with exponential backoff.
///
/// # Errors
/// Returns `sqlx::Error` if every connection attempt fails.
pub async fn init_pool(config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
    let connect = || {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
    };

    connect
        .retry(ExponentialBuilder::default().with_max_times(config.connect_attempts))
        .notify(|e: &sqlx::Error, delay: Duration| {
            tracing::warn!(error = %e, retry_in_ms = %delay.as_millis(), "Database connection failed, retrying");
        })
        .await
}

/// Runs the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

pub(crate) fn is_violation(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.code().as_deref() == Some(code))
}

#[derive(Clone, Debug)]
pub struct PgReadiness {
    pool: DbPool,
}

impl PgReadiness {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Readiness for PgReadiness {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
