//! Notification endpoints.
//!
//! Marking notifications seen also pushes the caller's refreshed unseen count
//! to their live connection, if any.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use murmur_auth::JwtValidator;
use murmur_core::NotificationId;
use murmur_realtime::{ChatCore, NotificationQuery};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for the unseen notification count.
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    /// Number of unseen notifications.
    pub count: u32,
}

/// Response for a bulk mark-seen.
#[derive(Debug, Serialize)]
pub struct MarkAllSeenResponse {
    /// Number of notifications that were unseen.
    pub updated_count: u32,
}

/// Count the caller's unseen notifications.
///
/// # Errors
///
/// Returns 500 if the count cannot be read.
pub async fn unread_count<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let count = state.chat.unread_notification_count(user.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// List the caller's notifications, newest first.
///
/// Query parameters: `page` (from 1), `limit` (default 20, at most 100) and
/// `is_seen` to filter by seen state.
///
/// # Errors
///
/// Returns 500 if the notifications cannot be read.
pub async fn list<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let page = state.chat.list_notifications(user.user_id, query).await?;
    Ok(Json(page))
}

/// Mark one of the caller's notifications as seen.
///
/// # Errors
///
/// Returns 404 if the notification doesn't exist or belongs to someone else.
pub async fn mark_seen<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let notification_id: NotificationId = notification_id.parse()?;
    let notification = state
        .chat
        .mark_notification_seen(user.user_id, notification_id)
        .await?;

    Ok(Json(notification))
}

/// Mark all of the caller's notifications as seen.
///
/// # Errors
///
/// Returns 500 if the update fails.
pub async fn mark_all_seen<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let updated_count = state.chat.mark_all_notifications_seen(user.user_id).await?;
    Ok(Json(MarkAllSeenResponse { updated_count }))
}
