use crate::api::AppState;
use crate::api::messages::bad_body;
use crate::api::middleware::AuthUser;
use crate::api::schemas::categories::CreateCategory;
use crate::error::Result;
use crate::protocol::CategoryDto;
use crate::services::message_service::parse_id;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// # Errors
/// Returns an error if the catalogue cannot be read.
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = state.category_service.list_categories().await?;
    Ok(Json(categories.into_iter().map(CategoryDto::from).collect::<Vec<_>>()))
}

/// # Errors
/// Returns `AppError::NotFound` if the category does not exist.
pub async fn get_category(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let category = state.category_service.get_category(parse_id(&id, "id")?).await?;
    Ok(Json(CategoryDto::from(category)))
}

/// # Errors
/// Returns `AppError::BadRequest` if the name is missing.
/// Returns `AppError::Conflict` if the name is taken.
pub async fn create_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateCategory>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(bad_body)?;
    let category =
        state.category_service.create_category(&auth_user.identity, body.name.as_deref(), body.subcategories).await?;
    Ok((StatusCode::CREATED, Json(CategoryDto::from(category))))
}
