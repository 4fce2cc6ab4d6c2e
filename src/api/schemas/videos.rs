use crate::domain::video::{VideoDraft, VideoEdit, VideoPatch};
use crate::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VideoQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub uploader: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
}

impl From<CreateVideo> for VideoDraft {
    fn from(body: CreateVideo) -> Self {
        Self {
            title: body.title,
            description: body.description,
            category: body.category,
            subcategory: body.subcategory,
            url: body.url,
            thumbnail: body.thumbnail,
        }
    }
}

/// Body of `PATCH /videos/{id}`: either `{"action": "like" | "unlike"}` or metadata fields.
/// The URL, uploader and likes cannot be edited.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateVideo {
    pub action: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub thumbnail: Option<String>,
}

impl TryFrom<UpdateVideo> for VideoPatch {
    type Error = AppError;

    fn try_from(body: UpdateVideo) -> Result<Self, Self::Error> {
        let edit = VideoEdit {
            title: body.title,
            description: body.description,
            category: body.category,
            subcategory: body.subcategory,
            thumbnail: body.thumbnail,
        };
        match body.action.as_deref() {
            None => Ok(Self::Edit(edit)),
            Some(_) if !edit.is_empty() => {
                Err(AppError::BadRequest("Invalid payload: \"action\" cannot be combined with edits".to_string()))
            }
            Some("like") => Ok(Self::Like),
            Some("unlike") => Ok(Self::Unlike),
            Some(other) => Err(AppError::BadRequest(format!("Invalid payload: unknown action \"{other}\""))),
        }
    }
}
