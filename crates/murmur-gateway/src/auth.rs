//! Authentication extractor.
//!
//! This module provides the `AuthUser` extractor that validates bearer
//! tokens and resolves them to a stored user.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use murmur_auth::{AuthError, JwtValidator};
use murmur_core::UserId;
use murmur_realtime::{ChatCore, ChatError};

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated user.
///
/// The token is read from the `Authorization: Bearer <token>` header, or
/// from a `token` query parameter for clients that cannot set headers on a
/// WebSocket upgrade. The user it names must exist.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user.
    pub user_id: UserId,
    /// The user's handle.
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the raw token out of the request, header first.
fn extract_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for AuthUser
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, V>>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(AuthError::MissingToken)?;
        let claims = state.jwt_validator.validate(&token).await?;

        let user = state
            .chat
            .get_user(claims.user_id)
            .await
            .map_err(|e| match e {
                ChatError::UserNotFound(_) => ApiError::from(AuthError::UnknownUser),
                other => ApiError::from(other),
            })?;

        Ok(Self {
            user_id: user.user_id,
            username: user.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn token_from_header() {
        let parts = parts("/v1/ws", Some("Bearer abc"));
        assert_eq!(extract_token(&parts).as_deref(), Some("abc"));
    }

    #[test]
    fn token_from_query() {
        let parts = parts("/v1/ws?token=test-token%3A7", None);
        assert_eq!(extract_token(&parts).as_deref(), Some("test-token:7"));
    }

    #[test]
    fn header_wins_over_query() {
        let parts = parts("/v1/ws?token=query", Some("Bearer header"));
        assert_eq!(extract_token(&parts).as_deref(), Some("header"));
    }

    #[test]
    fn missing_or_malformed_token() {
        assert!(extract_token(&parts("/v1/ws", None)).is_none());
        assert!(extract_token(&parts("/v1/ws", Some("Basic abc"))).is_none());
        assert!(extract_token(&parts("/v1/ws?token=", None)).is_none());
    }
}
