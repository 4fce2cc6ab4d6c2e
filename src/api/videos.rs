use crate::api::AppState;
use crate::api::messages::bad_body;
use crate::api::middleware::AuthUser;
use crate::api::schemas::videos::{CreateVideo, UpdateVideo, VideoQuery};
use crate::domain::video::{VideoFilter, VideoPatch};
use crate::error::Result;
use crate::protocol::VideoDto;
use crate::services::message_service::parse_id;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// Lists videos newest first, optionally narrowed by `category`, `subcategory` and `uploader`.
///
/// # Errors
/// Returns `AppError::BadRequest` if `uploader` is not a valid id.
pub async fn list_videos(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<impl IntoResponse> {
    let filter = VideoFilter {
        category: non_empty(query.category),
        subcategory: non_empty(query.subcategory),
        uploader: non_empty(query.uploader).map(|u| parse_id(&u, "uploader")).transpose()?,
    };
    let videos = state.video_service.list_videos(&auth_user.identity, &filter).await?;
    Ok(Json(videos.into_iter().map(VideoDto::from).collect::<Vec<_>>()))
}

/// # Errors
/// Returns `AppError::NotFound` if the video does not exist.
pub async fn get_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let view = state.video_service.get_video(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(Json(VideoDto::from(view)))
}

/// # Errors
/// Returns `AppError::BadRequest` if a required field is missing or the URL is not http(s).
pub async fn create_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateVideo>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(bad_body)?;
    let view = state.video_service.publish(&auth_user.identity, body.into()).await?;
    Ok((StatusCode::CREATED, Json(VideoDto::from(view))))
}

/// # Errors
/// Returns `AppError::Forbidden` when someone other than the uploader edits metadata.
/// Returns `AppError::NotFound` if the video does not exist.
pub async fn update_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateVideo>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(bad_body)?;
    let patch = VideoPatch::try_from(body)?;
    let view = state.video_service.patch_video(&auth_user.identity, parse_id(&id, "id")?, patch).await?;
    Ok(Json(VideoDto::from(view)))
}

/// # Errors
/// Returns `AppError::Forbidden` when someone other than the uploader deletes.
/// Returns `AppError::NotFound` if the video does not exist.
pub async fn delete_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.video_service.delete_video(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
