use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Message safe to show to a client, for both REST bodies and gateway events.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => {
                tracing::debug!("Authentication failed");
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => {
                tracing::debug!("Caller does not own the resource");
                StatusCode::FORBIDDEN
            }
            Self::NotFound => {
                tracing::debug!("Resource not found");
                StatusCode::NOT_FOUND
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                StatusCode::CONFLICT
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.public_message()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::BadRequest("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("username".into()).into_response().status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(AppError::BadRequest("Missing \"with\" query param".into()).public_message(), "Missing \"with\" query param");
    }
}
