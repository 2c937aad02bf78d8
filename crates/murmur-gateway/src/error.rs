//! API error types and responses.
//!
//! This module defines the standard error format for all API responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use murmur_auth::AuthError;
use murmur_core::IdError;
use murmur_realtime::{ChatError, ErrorKind};

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication token.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller may not perform this action.
    #[error("{0}")]
    Forbidden(String),

    /// The requested resource was not found.
    #[error("{0}")]
    NotFound(String),

    /// Invalid request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.http_status_code() == StatusCode::UNAUTHORIZED.as_u16() {
            tracing::debug!(error = %err, "Rejected credentials");
            Self::Unauthorized
        } else {
            tracing::error!(error = %err, "Auth internal error");
            Self::Internal("authentication service error".to_string())
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.client_message().into_owned();
        match err.kind() {
            ErrorKind::Forbidden => Self::Forbidden(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::InvalidArgument => Self::BadRequest(message),
            ErrorKind::Transient => {
                tracing::error!(error = %err, "Messaging error");
                Self::Internal(message)
            }
        }
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{ConversationId, MessageId, NotificationId, UserId};
    use murmur_store::StoreError;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("test".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn chat_errors_map_to_status() {
        let denied = ApiError::from(ChatError::AccessDenied(ConversationId::new(1)));
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(denied.to_string(), "Access denied to this conversation");

        let missing = ApiError::from(ChatError::StatusNotFound {
            message_id: MessageId::new(1),
            receiver_id: UserId::new(2),
        });
        assert_eq!(missing.code(), "not_found");

        let notification = ApiError::from(ChatError::NotificationNotFound(NotificationId::new(7)));
        assert_eq!(notification.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(notification.to_string(), "Notification not found");

        let blocked = ApiError::from(ChatError::Forbidden("blocked".into()));
        assert_eq!(blocked.status_code(), StatusCode::FORBIDDEN);

        let invalid = ApiError::from(ChatError::InvalidArgument("Invalid status".into()));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let storage = ApiError::from(ChatError::Store(StoreError::Database(
            "corrupt sst".into(),
        )));
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!storage.to_string().contains("sst"));
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        assert!(matches!(
            ApiError::from(AuthError::TokenExpired),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(AuthError::UnknownUser),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(AuthError::Internal("x".into())),
            ApiError::Internal(_)
        ));
    }
}
