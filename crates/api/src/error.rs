//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use warden_shared::StoreError;

use crate::auth::password::PasswordError;

/// Application error type
///
/// Every failure path of the session and reset flows ends up here and is turned
/// into a status code plus a uniform `{"error": {"code", "message"}}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Session is invalid or has expired")]
    SessionInvalid,
    #[error("Session was ended by a newer login elsewhere")]
    SessionExpiredConcurrent,
    #[error("Reset token is invalid or has expired")]
    TokenExpiredOrInvalid,
    #[error("Anti-forgery token missing or invalid")]
    AntiForgeryFailed,
    #[error("Insufficient permissions")]
    Forbidden,

    // Resource errors
    #[error("Account not found")]
    PrincipalNotFound,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Internal errors
    #[error("Internal server error")]
    Unexpected,
}

impl ApiError {
    /// Machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::SessionInvalid => "SESSION_INVALID",
            ApiError::SessionExpiredConcurrent => "SESSION_EXPIRED_CONCURRENT",
            ApiError::TokenExpiredOrInvalid => "TOKEN_EXPIRED_OR_INVALID",
            ApiError::AntiForgeryFailed => "ANTI_FORGERY_FAILED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::PrincipalNotFound => "PRINCIPAL_NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unexpected => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials
            | ApiError::SessionInvalid
            | ApiError::SessionExpiredConcurrent
            | ApiError::TokenExpiredOrInvalid => StatusCode::UNAUTHORIZED,
            ApiError::AntiForgeryFailed | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::PrincipalNotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::SessionExpiredConcurrent => {
                "Your session ended because your account signed in from another location."
                    .to_string()
            }
            ApiError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = ?err, "Store error");
        ApiError::Unexpected
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing error");
        ApiError::Unexpected
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
