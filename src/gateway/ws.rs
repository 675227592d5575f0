//! Push gateway over WebSocket
//!
//! A socket authenticates with `?token=`, then sends `join`, `cancel` and
//! `answer` messages. Replies and pushed matches arrive as `queued`,
//! `matching`, `found`, `answered`, `error` or `cancelled` events. Closing
//! the socket removes the player from the queue if they were waiting on it.

use crate::gateway::http::ApiError;
use crate::gateway::messages::{ClientMessage, ServerEvent};
use crate::gateway::GatewayState;
use crate::queue::LeaveReason;
use crate::types::{ConnectionId, PlayerId};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// `GET /ws?token=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(WsQuery { token }): Query<WsQuery>,
) -> std::result::Result<Response, ApiError> {
    let player_id = state.resolve_player(&token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, player_id, socket)))
}

async fn handle_socket(state: GatewayState, player_id: PlayerId, socket: WebSocket) {
    let (connection_id, events) = match state.connections.open(&player_id) {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Could not register push connection for '{}': {}", player_id, e);
            return;
        }
    };
    info!(
        "Push connection {} established for player '{}'",
        connection_id, player_id
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        let mut outgoing = UnboundedReceiverStream::new(events);
        while let Some(event) = outgoing.next().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                debug!("Push writer stopped: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(request) => {
                        handle_client_message(&state, &player_id, connection_id, request).await
                    }
                    Err(e) => {
                        debug!("Unreadable message from '{}': {}", player_id, e);
                        ServerEvent::Error {
                            message: format!("Unrecognized message: {}", e),
                            code: "invalid_request".to_string(),
                            retryable: false,
                        }
                    }
                };

                if !matches!(state.connections.send(&connection_id, reply), Ok(true)) {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    close_connection(&state, &player_id, connection_id);
    writer.abort();

    info!(
        "Push connection {} closed for player '{}'",
        connection_id, player_id
    );
}

/// Dequeue the player if they were waiting on this connection, then forget it
pub fn close_connection(state: &GatewayState, player_id: &PlayerId, connection_id: ConnectionId) {
    if let Err(e) = state.matchmaker.disconnect(player_id, connection_id) {
        warn!("Failed to dequeue '{}' after disconnect: {}", player_id, e);
    }
    state.connections.close(&connection_id);
}

/// Reply to one message from a connected player
pub async fn handle_client_message(
    state: &GatewayState,
    player_id: &PlayerId,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> ServerEvent {
    match message {
        ClientMessage::Join => match state.matchmaker.join(player_id, Some(connection_id)).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                debug!("Join over push connection failed for '{}': {}", player_id, e);
                ServerEvent::from_error(&e)
            }
        },
        ClientMessage::Cancel => match state.matchmaker.leave(player_id, LeaveReason::Cancelled) {
            Ok(_) => ServerEvent::Cancelled,
            Err(e) => ServerEvent::from_error(&e),
        },
        ClientMessage::Answer { session_id, answer } => match state
            .aggregator
            .record_answer(player_id, &session_id, answer)
            .await
        {
            Ok(receipt) => ServerEvent::Answered(receipt),
            Err(e) => {
                debug!(
                    "Answer over push connection failed for '{}' in session {}: {}",
                    player_id, session_id, e
                );
                ServerEvent::from_error(&e)
            }
        },
    }
}
