use crate::adapters::database::records::UserRecord;
use crate::adapters::database::{DbPool, UNIQUE_VIOLATION, is_violation};
use crate::domain::user::{NewUser, User};
use crate::error::{AppError, Result};
use crate::services::repository::UserRepository;
use async_trait::async_trait;
use uuid::Uuid;

const COLUMNS: &str = "id, google_id, name, email, avatar, username, created_at";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE wildcards so the query is matched literally.
fn like_pattern(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(level = "debug", skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            INSERT INTO users (id, google_id, name, email, avatar, username)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(&user.google_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.avatar.as_deref())
        .bind(&user.username)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(e) if is_violation(&e, UNIQUE_VIOLATION) => {
                Err(AppError::Conflict(format!("User {} already exists", user.username)))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, google_id))]
    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users WHERE google_id = $1"))
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!("SELECT {COLUMNS} FROM users ORDER BY created_at ASC"))
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            SELECT {COLUMNS}
            FROM users
            WHERE name ILIKE $1 OR username ILIKE $1
            ORDER BY username ASC
            "
        ))
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("sara"), "%sara%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
