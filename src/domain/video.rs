use crate::domain::user::UserSummary;
use time::OffsetDateTime;
use uuid::Uuid;

/// A published video. The media itself lives on the CDN; only its URL is kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub uploader: Uuid,
    /// Users who liked the video, each at most once.
    pub liked_by: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Video {
    #[must_use]
    pub fn likes(&self) -> usize {
        self.liked_by.len()
    }
}

/// A video with its uploader expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoView {
    pub video: Video,
    pub uploader: UserSummary,
}

/// Publish request for a video already uploaded to the CDN.
#[derive(Debug, Clone, Default)]
pub struct VideoDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub uploader: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub uploader: Option<Uuid>,
}

impl VideoFilter {
    #[must_use]
    pub fn matches(&self, video: &Video) -> bool {
        self.category.as_ref().is_none_or(|c| *c == video.category)
            && self.subcategory.as_ref().is_none_or(|s| *s == video.subcategory)
            && self.uploader.is_none_or(|u| u == video.uploader)
    }
}

/// Metadata the uploader may change after publishing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoEdit {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.thumbnail.is_none()
    }

    pub(crate) fn apply(&self, video: &mut Video) {
        if let Some(title) = &self.title {
            video.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            video.description = Some(description.clone());
        }
        if let Some(category) = &self.category {
            video.category.clone_from(category);
        }
        if let Some(subcategory) = &self.subcategory {
            video.subcategory.clone_from(subcategory);
        }
        if let Some(thumbnail) = &self.thumbnail {
            video.thumbnail = Some(thumbnail.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPatch {
    Like,
    Unlike,
    Edit(VideoEdit),
}

/// The CDN reference of a media URL: its last path segment without the extension.
#[must_use]
pub fn media_public_id(url: &str) -> Option<&str> {
    let segment = url.split(['?', '#']).next()?.trim_end_matches('/').rsplit('/').next()?;
    let id = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(category: &str, subcategory: &str, uploader: Uuid) -> Video {
        Video {
            id: Uuid::new_v4(),
            title: "clip".into(),
            description: None,
            category: category.into(),
            subcategory: subcategory.into(),
            url: "https://cdn.example.com/v1/clip.mp4".into(),
            thumbnail: None,
            uploader,
            liked_by: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_media_public_id() {
        assert_eq!(media_public_id("https://res.example.com/video/upload/v17/abc123.mp4"), Some("abc123"));
        assert_eq!(media_public_id("https://res.example.com/video/upload/abc123"), Some("abc123"));
        assert_eq!(media_public_id("https://res.example.com/a/b.c.webm?x=1"), Some("b.c"));
        assert_eq!(media_public_id(""), None);
    }

    #[test]
    fn test_filter_matches_all_given_fields() {
        let uploader = Uuid::new_v4();
        let clip = video("Games", "Minecraft", uploader);

        assert!(VideoFilter::default().matches(&clip));
        assert!(VideoFilter { category: Some("Games".into()), ..VideoFilter::default() }.matches(&clip));
        assert!(
            !VideoFilter { category: Some("Games".into()), subcategory: Some("PUBG".into()), uploader: None }
                .matches(&clip)
        );
        assert!(!VideoFilter { uploader: Some(Uuid::new_v4()), ..VideoFilter::default() }.matches(&clip));
    }

    #[test]
    fn test_edit_leaves_ownership_and_likes_alone() {
        let uploader = Uuid::new_v4();
        let mut clip = video("Games", "PUBG", uploader);
        clip.liked_by.push(Uuid::new_v4());

        VideoEdit { title: Some("renamed".into()), ..VideoEdit::default() }.apply(&mut clip);
        assert_eq!(clip.title, "renamed");
        assert_eq!(clip.uploader, uploader);
        assert_eq!(clip.likes(), 1);
    }
}
