use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::errors::LeagueError;

/// API error type with HTTP status code, message and machine-readable code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Creates a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Creates a 403 Forbidden error
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Creates a 409 Conflict error
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}

impl From<LeagueError> for ApiError {
    fn from(err: LeagueError) -> Self {
        use crate::domain::errors::ValidationError::*;

        let code = err.code();
        match &err {
            LeagueError::Validation(AlreadyDrafted(_) | AlreadyMember | DuplicateInviteCode) => {
                Self::conflict(code, err.to_string())
            }
            LeagueError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, code, err.to_string()),
            LeagueError::Authorization(_) => Self::forbidden(code, err.to_string()),
            LeagueError::NotFound(_) => Self::not_found(err.to_string()),
            LeagueError::ConcurrencyConflict { .. } => Self::conflict(code, err.to_string()),
            LeagueError::Store(message) => {
                error!("Store failure: {}", message);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "Internal storage error")
            }
        }
    }
}
