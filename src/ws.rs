//! Per-connection session handler: one WebSocket per client, one session id.

use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::db::EnrichedMessage;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::relay::{Outbound, RelayHandle, SessionId};
use crate::storage;

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(
    State(db_pool): State<SqlitePool>,
    State(relay): State<RelayHandle>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, db_pool, relay))
}

async fn handle_socket(socket: WebSocket, db_pool: SqlitePool, relay: RelayHandle) {
    let session = Uuid::now_v7();
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    relay.connect(session, outbound.clone());

    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Ok(event) = serde_json::from_slice::<ClientEvent>(&msg.into_data()) else {
            continue;
        };

        handle_event(&db_pool, &relay, session, &outbound, event).await;
    }

    relay.disconnect(session);
    forward_task.abort();
}

/// Applies one client event: membership changes go straight to the relay,
/// sends are persisted and enriched here, then handed off for fan-out.
pub async fn handle_event(
    db_pool: &SqlitePool,
    relay: &RelayHandle,
    session: SessionId,
    outbound: &Outbound,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom { room_id } => {
            if room_id.is_empty() {
                let _ = outbound.send(ServerEvent::error("joinRoom: empty roomId"));
                return;
            }
            relay.join(session, room_id);
        }
        ClientEvent::LeaveRoom { room_id } => {
            relay.leave(session, room_id);
        }
        ClientEvent::SendMessage { user_id, room_id, content, kind } => {
            if user_id.is_empty() || room_id.is_empty() || content.is_empty() {
                let _ = outbound.send(ServerEvent::error("sendMessage: empty field"));
                return;
            }

            // Persist first; nothing is announced that wasn't stored.
            let record =
                match storage::insert_message(db_pool, &user_id, &room_id, &content, kind).await {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(%session, %room_id, %err, "message insert failed");
                        let _ = outbound.send(ServerEvent::error("sendMessage: store failed"));
                        return;
                    }
                };

            // Enrichment is best-effort: a stored message is always announced.
            let data = match storage::fetch_message_with_sender(db_pool, &record.id).await {
                Ok(enriched) => enriched,
                Err(err) => {
                    warn!(%session, message_id = %record.id, %err, "sender enrichment failed");
                    EnrichedMessage::bare(record)
                }
            };

            relay.broadcast(room_id, ServerEvent::Message { data });
        }
    }
}
