use crate::adapters::database::records::{CategoryRecord, VideoRecord};
use crate::adapters::database::{DbPool, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION, is_violation};
use crate::domain::category::{Category, NewCategory};
use crate::domain::video::{NewVideo, Video, VideoEdit, VideoFilter};
use crate::error::{AppError, Result};
use crate::services::repository::{CategoryRepository, VideoRepository};
use async_trait::async_trait;
use uuid::Uuid;

const SELECT_VIDEO: &str = r"
    SELECT v.id, v.title, v.description, v.category, v.subcategory, v.url, v.thumbnail, v.uploader_id,
           ARRAY(
               SELECT l.user_id FROM video_likes l
               WHERE l.video_id = v.id
               ORDER BY l.created_at, l.user_id
           ) AS liked_by,
           v.created_at
    FROM videos v
";

#[derive(Clone, Debug)]
pub struct PgVideoRepository {
    pool: DbPool,
}

impl PgVideoRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[tracing::instrument(level = "debug", skip(self, video), fields(uploader = %video.uploader))]
    async fn create(&self, video: NewVideo) -> Result<Video> {
        let result = sqlx::query_as::<_, VideoRecord>(
            r"
            INSERT INTO videos (id, title, description, category, subcategory, url, thumbnail, uploader_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, description, category, subcategory, url, thumbnail, uploader_id,
                      ARRAY[]::UUID[] AS liked_by, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&video.title)
        .bind(video.description.as_deref())
        .bind(&video.category)
        .bind(&video.subcategory)
        .bind(&video.url)
        .bind(video.thumbnail.as_deref())
        .bind(video.uploader)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(e) if is_violation(&e, FOREIGN_KEY_VIOLATION) => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Video>> {
        let record = sqlx::query_as::<_, VideoRecord>(&format!("{SELECT_VIDEO} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self, filter: &VideoFilter) -> Result<Vec<Video>> {
        let records = sqlx::query_as::<_, VideoRecord>(&format!(
            r"
            {SELECT_VIDEO}
            WHERE ($1::TEXT IS NULL OR v.category = $1)
              AND ($2::TEXT IS NULL OR v.subcategory = $2)
              AND ($3::UUID IS NULL OR v.uploader_id = $3)
            ORDER BY v.created_at DESC, v.seq DESC
            "
        ))
        .bind(filter.category.as_deref())
        .bind(filter.subcategory.as_deref())
        .bind(filter.uploader)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(level = "debug", skip(self, edit))]
    async fn update(&self, id: Uuid, edit: &VideoEdit) -> Result<Option<Video>> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            r"
            UPDATE videos
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                subcategory = COALESCE($5, subcategory),
                thumbnail = COALESCE($6, thumbnail)
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(edit.title.as_deref())
        .bind(edit.description.as_deref())
        .bind(edit.category.as_deref())
        .bind(edit.subcategory.as_deref())
        .bind(edit.thumbnail.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.find(id).await,
            None => Ok(None),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn set_liked(&self, id: Uuid, user_id: Uuid, liked: bool) -> Result<Option<Video>> {
        if self.find(id).await?.is_none() {
            return Ok(None);
        }

        let result = if liked {
            sqlx::query("INSERT INTO video_likes (video_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await
        } else {
            sqlx::query("DELETE FROM video_likes WHERE video_id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await
        };

        match result {
            Ok(_) => self.find(id).await,
            // the video or the liker went away in between
            Err(e) if is_violation(&e, FOREIGN_KEY_VIOLATION) => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_by_uploader(&self, user_id: Uuid) -> Result<Vec<String>> {
        let urls: Vec<String> = sqlx::query_scalar("DELETE FROM videos WHERE uploader_id = $1 RETURNING url")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }
}

#[derive(Clone, Debug)]
pub struct PgCategoryRepository {
    pool: DbPool,
}

impl PgCategoryRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    #[tracing::instrument(level = "debug", skip(self, category), fields(name = %category.name))]
    async fn create(&self, category: NewCategory) -> Result<Category> {
        let result = sqlx::query_as::<_, CategoryRecord>(
            r"
            INSERT INTO categories (id, name, subcategories)
            VALUES ($1, $2, $3)
            RETURNING id, name, subcategories
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&category.name)
        .bind(&category.subcategories)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(e) if is_violation(&e, UNIQUE_VIOLATION) => {
                Err(AppError::Conflict(format!("Category {} already exists", category.name)))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Category>> {
        let record =
            sqlx::query_as::<_, CategoryRecord>("SELECT id, name, subcategories FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self) -> Result<Vec<Category>> {
        let records =
            sqlx::query_as::<_, CategoryRecord>("SELECT id, name, subcategories FROM categories ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }
}
