use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::users::SearchQuery;
use crate::error::Result;
use crate::protocol::{UserDetailDto, UserSummaryDto};
use crate::services::message_service::parse_id;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// # Errors
/// Returns an error if the directory cannot be read.
pub async fn list_users(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.user_service.list_users(&auth_user.identity).await?;
    Ok(Json(users.iter().map(UserSummaryDto::from).collect::<Vec<_>>()))
}

/// # Errors
/// Returns `AppError::BadRequest` if `q` is missing or blank.
pub async fn search_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let found = state.user_service.search_users(&auth_user.identity, query.q.as_deref()).await?;
    Ok(Json(found.into_iter().map(UserSummaryDto::from).collect::<Vec<_>>()))
}

/// The profile together with the user's videos.
///
/// # Errors
/// Returns `AppError::NotFound` if the user does not exist.
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let profile = state.user_service.get_user(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(Json(UserDetailDto::from(profile)))
}

/// # Errors
/// Returns `AppError::Forbidden` when deleting anyone but the caller.
pub async fn delete_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.user_service.delete_user(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(StatusCode::NO_CONTENT)
}
