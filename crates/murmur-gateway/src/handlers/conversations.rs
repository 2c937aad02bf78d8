//! Conversation endpoints: history and bulk read.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use murmur_auth::JwtValidator;
use murmur_core::ConversationId;
use murmur_realtime::{ChatCore, HistoryQuery};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for a bulk mark-read.
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// Number of status rows moved to `read`.
    pub updated_count: u32,
}

/// Page through a conversation's messages, oldest first.
///
/// Query parameters: `limit` (default 50, at most 100) and
/// `before_message_id` to fetch older pages.
///
/// # Errors
///
/// Returns 403 if the caller is not a participant.
pub async fn history<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let conversation_id: ConversationId = conversation_id.parse()?;
    let page = state
        .chat
        .history(user.user_id, conversation_id, query)
        .await?;

    Ok(Json(page))
}

/// Mark every message in a conversation as read by the caller.
///
/// # Errors
///
/// Returns 403 if the caller is not a participant.
pub async fn mark_read<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let conversation_id: ConversationId = conversation_id.parse()?;
    let updated_count = state
        .chat
        .mark_all_read(conversation_id, user.user_id)
        .await?;

    Ok(Json(MarkReadResponse { updated_count }))
}
