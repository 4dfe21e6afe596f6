use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Message type tag stored in the `type` column and carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
}

/// A persisted message row, exactly as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: String,
    pub user_id: String,
    pub room_id: String,
    pub content: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: MessageType,
    pub is_read: bool,
    pub created_at: String,
}

/// Public profile fields used to enrich messages for client rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl Profile {
    /// Fallback when the sender's profile can't be fetched: identifier only.
    pub fn bare(user_id: &str) -> Self {
        Self {
            id: user_id.to_owned(),
            name: None,
            image: None,
        }
    }
}

/// A message joined with its sender's profile, the shape broadcast to rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMessage {
    #[serde(flatten)]
    pub message: MessageRecord,
    pub user: Profile,
}

impl EnrichedMessage {
    pub fn bare(message: MessageRecord) -> Self {
        let user = Profile::bare(&message.user_id);
        Self { message, user }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRecord {
    pub id: String,
    pub created_at: String,
}

pub async fn init(db_pool: &SqlitePool) -> sqlx::Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT,
            image TEXT
        )",
        "CREATE TABLE IF NOT EXISTS chat_rooms (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        "CREATE TABLE IF NOT EXISTS chat_users (
            room_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            other_user_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, other_user_id)
        )",
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            room_id TEXT NOT NULL,
            content TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'text',
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ];

    for statement in statements {
        sqlx::query(statement).execute(db_pool).await?;
    }

    Ok(())
}
