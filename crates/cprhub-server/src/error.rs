//! API error types

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cprhub_core::error::CprError;
use serde::Serialize;
use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] CprError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing or malformed bearer token")]
    MissingToken,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(CprError::validation(message))
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Domain(CprError::denied(reason))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Domain(CprError::Conflict(message.into()))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Domain(e) => match e {
                CprError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CprError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
                CprError::AuthenticationFailed { .. } => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
                }
                CprError::AuthorizationDenied { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                CprError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                CprError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                CprError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                CprError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                CprError::Crypto(_) | CprError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Error envelope: `{ "success": false, "error": { "code", "message" } }`.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Internal details stay in the log.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
            "internal server error".to_string()
        } else {
            if status == StatusCode::UNAUTHORIZED {
                tracing::warn!(error = %self, "authentication failed");
            } else {
                tracing::debug!(error = %self, code, "request rejected");
            }
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;
