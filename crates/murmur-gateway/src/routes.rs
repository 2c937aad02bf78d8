//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use murmur_auth::JwtValidator;
use murmur_realtime::ChatCore;

use crate::handlers::{conversations, health, messages, notifications, ws};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Messaging (authenticated)
/// - `POST /v1/messages` - Send a message
/// - `PATCH /v1/messages/{message_id}/status` - Advance delivery status
/// - `GET /v1/conversations/{conversation_id}/messages` - Message history
/// - `PATCH /v1/conversations/{conversation_id}/read` - Mark all read
/// - `GET /v1/notifications` - List notifications
/// - `GET /v1/notifications/unread/count` - Unseen notification count
/// - `PATCH /v1/notifications/{notification_id}/seen` - Mark one seen
/// - `PATCH /v1/notifications/mark-all-seen` - Mark all seen
/// - `GET /v1/ws` - WebSocket connection
pub fn create_router<C, V>(state: GatewayState<C, V>) -> Router
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    // The request timeout would cut live sockets, so the WebSocket route
    // sits outside it.
    let api = Router::new()
        .route("/v1/messages", post(messages::send_message::<C, V>))
        .route(
            "/v1/messages/{message_id}/status",
            patch(messages::update_status::<C, V>),
        )
        .route(
            "/v1/conversations/{conversation_id}/messages",
            get(conversations::history::<C, V>),
        )
        .route(
            "/v1/conversations/{conversation_id}/read",
            patch(conversations::mark_read::<C, V>),
        )
        .route("/v1/notifications", get(notifications::list::<C, V>))
        .route(
            "/v1/notifications/unread/count",
            get(notifications::unread_count::<C, V>),
        )
        .route(
            "/v1/notifications/{notification_id}/seen",
            patch(notifications::mark_seen::<C, V>),
        )
        .route(
            "/v1/notifications/mark-all-seen",
            patch(notifications::mark_all_seen::<C, V>),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/health", get(health::health::<C, V>))
        .route("/v1/ws", get(ws::websocket_handler::<C, V>))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_any_origin() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "not a header value\n".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }
}
