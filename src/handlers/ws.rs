// src/handlers/ws.rs
//
// Live notification channel. A client connects with its JWT, then asks to
// join rooms; the server only admits it to rooms its verified identity is
// entitled to (a teacher's own room and owned classes, a student's enrolled
// classes). Events published to a joined room are pushed as JSON frames.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::{
    error::AppError,
    models::class,
    state::AppState,
    utils::jwt::{Claims, verify_jwt},
};

/// Browsers cannot set headers on a WebSocket handshake, so the token
/// travels as a query parameter. Optional so that a handshake without it
/// still reaches the handler and is answered with 401, not a 400 from the
/// extractor.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Messages a connected client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    JoinRoom { room: String },
}

/// Upgrades the connection once the token verifies.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = params
        .token
        .ok_or_else(|| AppError::AuthError("Missing token".to_string()))?;
    let claims = verify_jwt(&token, &state.config.jwt_secret)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims)))
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.hub.register();

    tracing::info!("WebSocket connection {} established", conn_id);

    // Single writer task: room events and control replies share one queue,
    // so a slow client only ever backs up its own channel.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::JoinRoom { room }) => {
                        match can_join(&state.pool, &claims, &room).await {
                            Ok(true) => {
                                state.hub.subscribe(conn_id, &room, tx.clone());
                                tracing::info!("Connection {} joined room {}", conn_id, room);
                                json!({ "type": "joined", "room": room })
                            }
                            Ok(false) => {
                                json!({ "type": "error", "message": "Not allowed to join this room." })
                            }
                            Err(e) => {
                                tracing::error!("Room check failed: {}", e);
                                json!({ "type": "error", "message": "Internal error." })
                            }
                        }
                    }
                    Err(_) => json!({ "type": "error", "message": "Unrecognized message." }),
                };
                if tx.send(reply.to_string()).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.hub.unsubscribe(conn_id);
    send_task.abort();
    tracing::info!("WebSocket connection {} closed", conn_id);
}

/// Whether the verified caller may join `room`.
async fn can_join(pool: &SqlitePool, claims: &Claims, room: &str) -> Result<bool, AppError> {
    let user_id = claims.user_id()?;

    if let Some(id) = room.strip_prefix("teacher:") {
        let Ok(teacher_id) = id.parse::<i64>() else {
            return Ok(false);
        };
        return Ok(claims.role == "teacher" && teacher_id == user_id);
    }

    if let Some(id) = room.strip_prefix("class:") {
        let Ok(class_id) = id.parse::<i64>() else {
            return Ok(false);
        };
        return match claims.role.as_str() {
            "student" => Ok(class::is_enrolled(pool, user_id, class_id).await?),
            "teacher" => {
                let owner: Option<i64> =
                    sqlx::query_scalar("SELECT teacher_id FROM classes WHERE id = ?")
                        .bind(class_id)
                        .fetch_optional(pool)
                        .await?;
                Ok(owner == Some(user_id))
            }
            _ => Ok(false),
        };
    }

    Ok(false)
}
