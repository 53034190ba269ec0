use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use modelgen_core::error::CoreError;
use modelgen_core::types::OwnerId;
use serde::Deserialize;

use crate::auth::jwt::{bearer_token, validate_token};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::protocol::{ClientMessage, ServerReply};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Optional token to authenticate at upgrade time.
    pub token: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// A `?token=` that fails validation rejects the upgrade with 401. Without a
/// token the socket starts unauthenticated and may send `authenticate`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let owner_id = match params.token.as_deref() {
        Some(token) => Some(
            validate_token(bearer_token(token), &state.config.jwt)
                .map_err(|_| {
                    AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
                })?
                .id,
        ),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, owner_id)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers the connection, spawns a sender task that forwards messages from
/// the manager channel, processes inbound messages on the current task and
/// cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, owner_id: Option<OwnerId>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, owner_id = ?owner_id, "WebSocket connected");

    let ws_manager = state.ws_manager.clone();
    let mut rx = ws_manager.add(conn_id.clone(), owner_id).await;
    if let Some(owner_id) = owner_id {
        ws_manager
            .send_to(&conn_id, ServerReply::Authenticated { owner_id }.to_message())
            .await;
    }

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                let reply = handle_client_message(&state, &conn_id, text.as_str()).await;
                ws_manager.send_to(&conn_id, reply.to_message()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one client message to the connection registration.
pub async fn handle_client_message(state: &AppState, conn_id: &str, text: &str) -> ServerReply {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(message) => return ServerReply::Error { message },
    };

    match message {
        ClientMessage::Authenticate { token } => {
            match validate_token(bearer_token(&token), &state.config.jwt) {
                Ok(claims) => {
                    state.ws_manager.authenticate(conn_id, claims.id).await;
                    tracing::info!(conn_id, owner_id = claims.id, "WebSocket authenticated");
                    ServerReply::Authenticated {
                        owner_id: claims.id,
                    }
                }
                Err(_) => ServerReply::Error {
                    message: "Invalid or expired token".into(),
                },
            }
        }
        ClientMessage::SubscribeToGeneration { generation_id } => {
            state.ws_manager.subscribe(conn_id, generation_id).await;
            tracing::debug!(conn_id, generation_id = %generation_id, "Subscribed to generation");
            ServerReply::Subscribed { generation_id }
        }
        ClientMessage::UnsubscribeFromGeneration { generation_id } => {
            state.ws_manager.unsubscribe(conn_id, generation_id).await;
            ServerReply::Unsubscribed { generation_id }
        }
    }
}
