//! The tagged event protocol spoken over each client WebSocket.

use serde::{Deserialize, Serialize};

use crate::db::{EnrichedMessage, MessageType};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        user_id: String,
        room_id: String,
        content: String,
        #[serde(rename = "type", default)]
        kind: MessageType,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    Message { data: EnrichedMessage },
    Error { msg: String },
}

impl ServerEvent {
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error { msg: msg.into() }
    }
}
