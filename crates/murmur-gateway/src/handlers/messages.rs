//! Message endpoints.
//!
//! REST counterparts of the `send_message` and status commands. They run the
//! same pipeline as the WebSocket surface, so live subscribers see messages
//! posted here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use murmur_auth::JwtValidator;
use murmur_core::{ConversationId, MessageId, UserId};
use murmur_realtime::{lifecycle, ChatCore, DeliveryStatus, StatusChange};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to post a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Message body.
    pub content: String,
}

/// Request to advance a delivery status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    /// `delivered` or `read`.
    pub status: String,
}

/// Response for a status update.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// The message.
    pub message_id: MessageId,
    /// The caller, as recipient.
    pub receiver_id: UserId,
    /// Status after the update.
    pub status: DeliveryStatus,
    /// Whether the status moved.
    pub changed: bool,
}

impl From<StatusChange> for StatusResponse {
    fn from(change: StatusChange) -> Self {
        Self {
            message_id: change.message_id,
            receiver_id: change.receiver_id,
            status: change.status,
            changed: change.changed,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Post a message.
///
/// Responds `201 Created` with the message as fanned out to subscribers.
///
/// # Errors
///
/// Returns 400 for empty or oversized content, 403 if the caller is not a
/// participant or a block exists, 404 if the conversation doesn't exist.
pub async fn send_message<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let outcome = state
        .chat
        .send_message(user.user_id, body.conversation_id, &body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.message)))
}

/// Advance the caller's delivery status for a message.
///
/// # Errors
///
/// Returns 400 for an unknown status, 404 if the caller has no status row
/// for the message.
pub async fn update_status<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let message_id: MessageId = message_id.parse()?;
    let target = lifecycle::parse_status(&body.status)?;

    let change = state
        .chat
        .advance_status(message_id, user.user_id, target)
        .await?;

    Ok(Json(StatusResponse::from(change)))
}
