//! WebSocket endpoint.
//!
//! Each upgraded socket becomes one live connection of the messaging core.
//! A writer task drains the connection's outbound queue onto the socket
//! while the reader runs client commands one at a time, in arrival order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::Receiver;

use murmur_auth::JwtValidator;
use murmur_core::UserId;
use murmur_realtime::{ChatCore, ClientCommand, ClientSession, ServerEvent, INVALID_FRAME_MESSAGE};

use crate::auth::AuthUser;
use crate::state::GatewayState;

/// WebSocket connection handler.
///
/// Authentication happens before the upgrade; a bad or missing token is
/// rejected with 401 and no socket is opened.
pub async fn websocket_handler<C, V>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
) -> Response
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    tracing::info!(user_id = %user.user_id, "WebSocket connection initiated");

    ws.on_upgrade(move |socket| handle_websocket(socket, state, user))
}

/// Handle the WebSocket connection after upgrade.
async fn handle_websocket<C, V>(socket: WebSocket, state: Arc<GatewayState<C, V>>, user: AuthUser)
where
    C: ChatCore + 'static,
    V: JwtValidator + 'static,
{
    let (session, events) = match state.chat.connect(user.user_id).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to register connection");
            return;
        }
    };

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_events(sink, events, user.user_id));
    let reader = read_commands(stream, state.chat.as_ref(), &session);

    tokio::select! {
        () = reader => {}
        _ = &mut writer => {
            tracing::debug!(user_id = %user.user_id, "Writer ended before reader");
        }
    }

    writer.abort();
    state.chat.disconnect(&session).await;

    tracing::info!(
        user_id = %user.user_id,
        connection_id = %session.handle.id(),
        "WebSocket connection closed"
    );
}

/// Run client frames through the core until the socket closes.
async fn read_commands<C: ChatCore>(
    mut stream: SplitStream<WebSocket>,
    chat: &C,
    session: &ClientSession,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                session.handle.send(ServerEvent::error(INVALID_FRAME_MESSAGE));
                continue;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                tracing::debug!(user_id = %session.user_id(), "Client closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(user_id = %session.user_id(), error = %e, "Error reading from client");
                break;
            }
        };

        match serde_json::from_str::<ClientCommand>(text.as_str()) {
            Ok(command) => chat.handle_command(session, command).await,
            Err(e) => {
                tracing::debug!(user_id = %session.user_id(), error = %e, "Invalid frame");
                session.handle.send(ServerEvent::error(INVALID_FRAME_MESSAGE));
            }
        }
    }
}

/// Forward queued events to the client until the queue or the socket closes.
async fn write_events(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: Receiver<ServerEvent>,
    user_id: UserId,
) {
    while let Some(event) = events.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(user_id = %user_id, event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(json.into())).await {
            tracing::debug!(user_id = %user_id, error = %e, "Failed to send to client");
            break;
        }
    }
    let _ = sink.close().await;
}
