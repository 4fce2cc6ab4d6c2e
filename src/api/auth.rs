use crate::api::AppState;
use crate::api::messages::bad_body;
use crate::api::schemas::auth::GoogleSignIn;
use crate::domain::user::GoogleProfile;
use crate::error::Result;
use crate::protocol::AuthSessionDto;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};

pub const EXCHANGE_SECRET_HEADER: &str = "x-auth-exchange-secret";

/// Exchanges a Google profile from the OAuth callback for an access token, creating the
/// account on first sign-in.
///
/// # Errors
/// Returns `AppError::Unauthorized` if an exchange secret is configured and not presented.
/// Returns `AppError::BadRequest` if the body is malformed or has no Google id.
pub async fn sign_in_google(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<GoogleSignIn>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let presented = headers.get(EXCHANGE_SECRET_HEADER).and_then(|v| v.to_str().ok());
    state.auth_service.verify_exchange(presented)?;

    let Json(body) = payload.map_err(bad_body)?;
    let (user, session) = state.user_service.sign_in_google(GoogleProfile::try_from(body)?).await?;
    Ok(Json(AuthSessionDto::new(user, session)))
}
