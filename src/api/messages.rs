use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messages::{ConversationQuery, CreateMessage, UpdateMessage};
use crate::error::{AppError, Result};
use crate::protocol::{MessageDto, MessageRecordDto};
use crate::services::message_service::parse_id;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// Lists the conversation between the caller and `?with=`, oldest first.
///
/// # Errors
/// Returns `AppError::BadRequest` if `with` is missing or invalid.
pub async fn list_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.list_conversation(&auth_user.identity, query.with.as_deref()).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect::<Vec<_>>()))
}

/// # Errors
/// Returns `AppError::BadRequest` on a malformed body or missing fields.
/// Returns `AppError::NotFound` if the recipient does not exist.
pub async fn create_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateMessage>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(bad_body)?;
    let view = state
        .message_service
        .create_message(&auth_user.identity, body.to.as_deref(), body.content.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(MessageDto::from(view))))
}

/// # Errors
/// Returns `AppError::NotFound` if the message does not exist.
pub async fn get_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let message = state.message_service.get_message(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(Json(MessageRecordDto::from(message)))
}

/// # Errors
/// Returns `AppError::BadRequest` if the body names a field other than `read` or `content`.
/// Returns `AppError::NotFound` if the message does not exist.
pub async fn update_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateMessage>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(bad_body)?;
    let message =
        state.message_service.update_message(&auth_user.identity, parse_id(&id, "id")?, body.into()).await?;
    Ok(Json(MessageRecordDto::from(message)))
}

/// # Errors
/// Returns `AppError::NotFound` if the message does not exist.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.message_service.delete_message(&auth_user.identity, parse_id(&id, "id")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}
