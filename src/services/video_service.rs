use crate::adapters::media::MediaStore;
use crate::domain::auth::Identity;
use crate::domain::user::UserSummary;
use crate::domain::video::{NewVideo, Video, VideoDraft, VideoEdit, VideoFilter, VideoPatch, VideoView, media_public_id};
use crate::error::{AppError, Result};
use crate::services::repository::{UserRepository, VideoRepository};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    published_total: Counter<u64>,
    reactions_total: Counter<u64>,
    media_release_failures_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("reeltalk-server");
        Self {
            published_total: meter
                .u64_counter("reeltalk_videos_published_total")
                .with_description("Total videos published")
                .build(),
            reactions_total: meter
                .u64_counter("reeltalk_video_reactions_total")
                .with_description("Likes and unlikes by action")
                .build(),
            media_release_failures_total: meter
                .u64_counter("reeltalk_media_release_failures_total")
                .with_description("CDN assets that could not be released after their video was removed")
                .build(),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid payload: \"{field}\" is required")))
}

fn non_blank(value: Option<&String>, field: &str) -> Result<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(AppError::BadRequest(format!("\"{field}\" cannot be empty"))),
        _ => Ok(()),
    }
}

fn check_edit(edit: &VideoEdit) -> Result<()> {
    non_blank(edit.title.as_ref(), "title")?;
    non_blank(edit.category.as_ref(), "category")?;
    non_blank(edit.subcategory.as_ref(), "subcategory")
}

#[derive(Clone, Debug)]
pub struct VideoService {
    videos: Arc<dyn VideoRepository>,
    users: Arc<dyn UserRepository>,
    media: Arc<dyn MediaStore>,
    metrics: Metrics,
}

impl VideoService {
    #[must_use]
    pub fn new(videos: Arc<dyn VideoRepository>, users: Arc<dyn UserRepository>, media: Arc<dyn MediaStore>) -> Self {
        Self { videos, users, media, metrics: Metrics::new() }
    }

    /// # Errors
    /// Returns an error if the catalogue cannot be read.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn list_videos(&self, caller: &Identity, filter: &VideoFilter) -> Result<Vec<VideoView>> {
        let videos = self.videos.list(filter).await?;
        self.expand(videos).await
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the video does not exist.
    pub async fn get_video(&self, _caller: &Identity, id: Uuid) -> Result<VideoView> {
        let video = self.videos.find(id).await?.ok_or(AppError::NotFound)?;
        self.expand_one(video).await
    }

    /// Publishes a video the caller has uploaded to the CDN.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if title, category, subcategory or url is missing.
    /// Returns `AppError::NotFound` if the caller's account no longer exists.
    #[tracing::instrument(err(level = "warn"), skip(self, caller, draft), fields(user_id = %caller.id))]
    pub async fn publish(&self, caller: &Identity, draft: VideoDraft) -> Result<VideoView> {
        let url = required(draft.url, "url")?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::BadRequest("Invalid \"url\"".to_string()));
        }

        let video = self
            .videos
            .create(NewVideo {
                title: required(draft.title, "title")?,
                description: draft.description.filter(|d| !d.trim().is_empty()),
                category: required(draft.category, "category")?,
                subcategory: required(draft.subcategory, "subcategory")?,
                url,
                thumbnail: draft.thumbnail.filter(|t| !t.trim().is_empty()),
                uploader: caller.id,
            })
            .await?;

        tracing::info!(video_id = %video.id, "Video published");
        self.metrics.published_total.add(1, &[]);
        self.expand_one(video).await
    }

    /// Likes, unlikes or edits a video. Anyone may react; only the uploader may edit.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the video does not exist.
    /// Returns `AppError::Forbidden` if a non-uploader edits metadata.
    /// Returns `AppError::BadRequest` if an edit blanks a required field.
    #[tracing::instrument(err(level = "warn"), skip(self, caller, patch), fields(user_id = %caller.id))]
    pub async fn patch_video(&self, caller: &Identity, id: Uuid, patch: VideoPatch) -> Result<VideoView> {
        let updated = match &patch {
            VideoPatch::Like | VideoPatch::Unlike => {
                let liked = matches!(patch, VideoPatch::Like);
                self.metrics.reactions_total.add(1, &[KeyValue::new("action", if liked { "like" } else { "unlike" })]);
                self.videos.set_liked(id, caller.id, liked).await?
            }
            VideoPatch::Edit(edit) => {
                check_edit(edit)?;
                let existing = self.videos.find(id).await?.ok_or(AppError::NotFound)?;
                if existing.uploader != caller.id {
                    return Err(AppError::Forbidden);
                }
                if edit.is_empty() { Some(existing) } else { self.videos.update(id, edit).await? }
            }
        };

        self.expand_one(updated.ok_or(AppError::NotFound)?).await
    }

    /// Removes a video and releases its media. Only the uploader may do this.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the video does not exist.
    /// Returns `AppError::Forbidden` if the caller is not the uploader.
    #[tracing::instrument(err(level = "warn"), skip(self, caller), fields(user_id = %caller.id))]
    pub async fn delete_video(&self, caller: &Identity, id: Uuid) -> Result<()> {
        let video = self.videos.find(id).await?.ok_or(AppError::NotFound)?;
        if video.uploader != caller.id {
            return Err(AppError::Forbidden);
        }
        if !self.videos.delete(id).await? {
            return Err(AppError::NotFound);
        }
        self.release_media(&video.url).await;
        Ok(())
    }

    /// Videos uploaded by `user_id`, newest first.
    ///
    /// # Errors
    /// Returns an error if the catalogue cannot be read.
    pub async fn uploaded_by(&self, user_id: Uuid) -> Result<Vec<Video>> {
        self.videos.list(&VideoFilter { uploader: Some(user_id), ..VideoFilter::default() }).await
    }

    /// Removes everything `user_id` uploaded and releases the media. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error if the catalogue cannot be written.
    pub async fn remove_uploads(&self, user_id: Uuid) -> Result<usize> {
        let urls = self.videos.delete_by_uploader(user_id).await?;
        for url in &urls {
            self.release_media(url).await;
        }
        Ok(urls.len())
    }

    // The row is already gone, so a CDN failure only leaves an orphaned asset.
    async fn release_media(&self, url: &str) {
        let Some(public_id) = media_public_id(url) else {
            tracing::warn!(url, "Media URL has no public id, nothing to release");
            return;
        };
        if let Err(e) = self.media.release(public_id).await {
            tracing::warn!(error = %e, public_id, "Failed to release media");
            self.metrics.media_release_failures_total.add(1, &[]);
        }
    }

    async fn expand_one(&self, video: Video) -> Result<VideoView> {
        self.expand(vec![video]).await?.pop().ok_or(AppError::Internal)
    }

    async fn expand(&self, videos: Vec<Video>) -> Result<Vec<VideoView>> {
        let mut ids: Vec<Uuid> = videos.iter().map(|v| v.uploader).collect();
        ids.sort_unstable();
        ids.dedup();

        let uploaders: HashMap<Uuid, UserSummary> =
            self.users.find_many(&ids).await?.iter().map(|u| (u.id, UserSummary::from(u))).collect();

        videos
            .into_iter()
            .map(|video| {
                let uploader = uploaders.get(&video.uploader).cloned().ok_or(AppError::NotFound)?;
                Ok(VideoView { video, uploader })
            })
            .collect()
    }
}
