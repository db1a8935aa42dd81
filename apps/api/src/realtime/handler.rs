//! WebSocket connection handler.
//!
//! A connection authenticates once at the handshake (`GET /ws?token=...`)
//! and may re-assert a refreshed token later without rejoining rooms.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher::Connection;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::errors::ApiError;
use crate::auth::jwt::{verify_token, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Upgrades an authenticated HTTP request to a WebSocket
///
/// GET /ws?token=...
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_token(&query.token, &state.jwt_secret)
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims)))
}

fn token_deadline(claims: &Claims) -> Instant {
    Instant::now() + Duration::from_secs(claims.seconds_remaining())
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match msg.to_json() {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize server message: {}", e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let (mut conn, mut events) = state.dispatcher.connect(claims.sub);
    let mut deadline = token_deadline(&claims);
    info!(connection_id = %conn.id(), user_id = %conn.user_id(), "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        connection_id: conn.id(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    if !send(&mut sender, &welcome).await {
        return;
    }

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let reply = match ClientMessage::from_json(&text) {
                    Ok(msg) => process_client_message(msg, &mut conn, &mut deadline, &state).await,
                    Err(e) => {
                        warn!(connection_id = %conn.id(), "Invalid message: {}", e);
                        ServerMessage::error("INVALID_MESSAGE", e.to_string())
                    }
                };
                if !send(&mut sender, &reply).await {
                    break;
                }
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if conn.wants(&event) && !send(&mut sender, &ServerMessage::from(event.as_ref().clone())).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // The change feed snapshot will catch the client up
                    warn!(connection_id = %conn.id(), "WebSocket lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = tokio::time::sleep_until(deadline) => {
                info!(connection_id = %conn.id(), "Identity token expired without refresh");
                let _ = send(&mut sender, &ServerMessage::error("TOKEN_EXPIRED", "Identity token expired")).await;
                break;
            }
        }
    }

    info!(connection_id = %conn.id(), "WebSocket disconnected");
}

async fn process_client_message(
    msg: ClientMessage,
    conn: &mut Connection,
    deadline: &mut Instant,
    state: &AppState,
) -> ServerMessage {
    match msg {
        ClientMessage::JoinLeague { league_id } => join_league(conn, league_id, state).await,

        ClientMessage::LeaveLeague { league_id } => {
            conn.leave_room(league_id);
            debug!(connection_id = %conn.id(), league_id = %league_id, "Left league room");
            ServerMessage::Left { league_id }
        }

        ClientMessage::Auth { token } => match verify_token(&token, &state.jwt_secret) {
            Ok(claims) if claims.sub == conn.user_id() => {
                *deadline = token_deadline(&claims);
                debug!(connection_id = %conn.id(), "Identity token refreshed");
                ServerMessage::AuthResult {
                    success: true,
                    message: "Token refreshed".to_string(),
                }
            }
            Ok(_) => ServerMessage::AuthResult {
                success: false,
                message: "Token belongs to a different user".to_string(),
            },
            Err(e) => {
                warn!(connection_id = %conn.id(), "Token refresh failed: {}", e);
                ServerMessage::AuthResult {
                    success: false,
                    message: format!("Authentication failed: {}", e),
                }
            }
        },

        ClientMessage::Ping => ServerMessage::Pong {
            timestamp: Utc::now().timestamp_millis(),
        },
    }
}

async fn join_league(conn: &mut Connection, league_id: Uuid, state: &AppState) -> ServerMessage {
    match state.leagues.get_league_for(league_id, conn.user_id()).await {
        Ok(_) => {
            if conn.join_room(league_id) {
                debug!(connection_id = %conn.id(), league_id = %league_id, "Joined league room");
            }
            ServerMessage::Joined { league_id }
        }
        Err(e) => ServerMessage::error(e.code(), e.to_string()),
    }
}
