use crate::api::AppState;
use crate::domain::auth::Identity;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The verified caller of a REST request.
#[derive(Debug)]
pub struct AuthUser {
    pub identity: Identity,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Unauthorized)?;
        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;

        let identity = state.auth_service.verify_bearer(auth_str)?;
        tracing::Span::current().record("user_id", tracing::field::display(identity.id));

        Ok(Self { identity })
    }
}

/// Keeps a well-formed incoming `x-request-id`, otherwise generates a UUID.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        let existing = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .filter(|v| v.to_str().is_ok_and(|s| !s.is_empty() && s.len() <= 128))
            .cloned();

        let value = existing.or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())?;
        Some(RequestId::new(value))
    }
}

/// Reads the request id assigned by `SetRequestIdLayer`.
#[must_use]
pub fn request_id(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map_or_else(|| "unknown".to_string(), str::to_string)
}
