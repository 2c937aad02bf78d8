//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use murmur_auth::JwtValidator;
use murmur_realtime::ChatCore;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Users with a live WebSocket connection on this node.
    pub online_users: usize,
}

/// Report liveness and the number of connected users.
///
/// Public; does not require authentication.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "online_users": 3
/// }
/// ```
pub async fn health<C, V>(State(state): State<Arc<GatewayState<C, V>>>) -> impl IntoResponse
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        online_users: state.chat.online_count(),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use murmur_auth::MockJwtValidator;
    use murmur_realtime::ChatService;
    use murmur_store::{RocksStore, Store};
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::config::GatewayConfig;

    async fn online_users<C, V>(state: &Arc<GatewayState<C, V>>) -> Value
    where
        C: ChatCore + 'static,
        V: JwtValidator + 'static,
    {
        let response = health(State(Arc::clone(state))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice::<Value>(&bytes).unwrap()["online_users"].clone()
    }

    #[tokio::test]
    async fn health_counts_connected_users() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let alice = store.create_user("alice", None, None).unwrap().user_id;
        let chat = Arc::new(ChatService::with_defaults(store));
        let state = Arc::new(GatewayState::new(
            Arc::clone(&chat),
            Arc::new(MockJwtValidator),
            GatewayConfig::default(),
        ));

        assert_eq!(online_users(&state).await, 0);

        let (session, _events) = chat.connect(alice).await.unwrap();
        assert_eq!(online_users(&state).await, 1);

        chat.disconnect(&session).await;
        assert_eq!(online_users(&state).await, 0);
    }
}
