//! Adapter over the persistent store for messages, rooms, and profiles.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{EnrichedMessage, MessageRecord, MessageType, Profile, RoomRecord};

pub const MESSAGE_PAGE_SIZE: u32 = 50;

pub async fn insert_message(
    db_pool: &SqlitePool,
    user_id: &str,
    room_id: &str,
    content: &str,
    kind: MessageType,
) -> sqlx::Result<MessageRecord> {
    let id = Uuid::now_v7();
    sqlx::query_as(
        "INSERT INTO messages (id,user_id,room_id,content,type) VALUES (?,?,?,?,?)
         RETURNING id,user_id,room_id,content,type,is_read,created_at",
    )
    .bind(id.to_string())
    .bind(user_id)
    .bind(room_id)
    .bind(content)
    .bind(kind)
    .fetch_one(db_pool)
    .await
}

pub async fn fetch_message_with_sender(
    db_pool: &SqlitePool,
    message_id: &str,
) -> sqlx::Result<EnrichedMessage> {
    let row: (String, String, String, String, MessageType, bool, String, Option<String>, Option<String>) =
        sqlx::query_as(
            "SELECT m.id,m.user_id,m.room_id,m.content,m.type,m.is_read,m.created_at,u.name,u.image
             FROM messages m LEFT JOIN users u ON u.id = m.user_id
             WHERE m.id=?",
        )
        .bind(message_id)
        .fetch_one(db_pool)
        .await?;

    let (id, user_id, room_id, content, kind, is_read, created_at, name, image) = row;
    Ok(EnrichedMessage {
        user: Profile { id: user_id.clone(), name, image },
        message: MessageRecord { id, user_id, room_id, content, kind, is_read, created_at },
    })
}

pub async fn list_messages(
    db_pool: &SqlitePool,
    room_id: &str,
    page: u32,
) -> sqlx::Result<Vec<EnrichedMessage>> {
    // page is caller-controlled; the offset must not overflow u32
    let offset = i64::from(page) * i64::from(MESSAGE_PAGE_SIZE);
    let rows: Vec<(String, String, String, String, MessageType, bool, String, Option<String>, Option<String>)> =
        sqlx::query_as(
            "SELECT m.id,m.user_id,m.room_id,m.content,m.type,m.is_read,m.created_at,u.name,u.image
             FROM messages m LEFT JOIN users u ON u.id = m.user_id
             WHERE m.room_id=?
             ORDER BY m.created_at ASC, m.rowid ASC
             LIMIT ? OFFSET ?",
        )
        .bind(room_id)
        .bind(MESSAGE_PAGE_SIZE)
        .bind(offset)
        .fetch_all(db_pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, room_id, content, kind, is_read, created_at, name, image)| {
            EnrichedMessage {
                user: Profile { id: user_id.clone(), name, image },
                message: MessageRecord { id, user_id, room_id, content, kind, is_read, created_at },
            }
        })
        .collect())
}

/// Returns the existing 1:1 room for the pair, or creates a fresh room plus
/// both membership edges in one transaction. A concurrent create for the
/// same pair trips the edge table's unique constraint; the loser falls back
/// to the room the winner committed.
pub async fn create_or_get_room(
    db_pool: &SqlitePool,
    user_id: &str,
    other_user_id: &str,
) -> sqlx::Result<RoomRecord> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT room_id FROM chat_users WHERE user_id=? AND other_user_id=?")
            .bind(user_id)
            .bind(other_user_id)
            .fetch_optional(db_pool)
            .await?;

    if let Some((room_id,)) = existing {
        return fetch_room(db_pool, &room_id).await;
    }

    match create_pair_room(db_pool, user_id, other_user_id).await {
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            let (room_id,): (String,) = sqlx::query_as(
                "SELECT room_id FROM chat_users
                 WHERE (user_id=? AND other_user_id=?) OR (user_id=? AND other_user_id=?)",
            )
            .bind(user_id)
            .bind(other_user_id)
            .bind(other_user_id)
            .bind(user_id)
            .fetch_one(db_pool)
            .await?;

            fetch_room(db_pool, &room_id).await
        }
        result => result,
    }
}

async fn fetch_room(db_pool: &SqlitePool, room_id: &str) -> sqlx::Result<RoomRecord> {
    sqlx::query_as("SELECT id,created_at FROM chat_rooms WHERE id=?")
        .bind(room_id)
        .fetch_one(db_pool)
        .await
}

async fn create_pair_room(
    db_pool: &SqlitePool,
    user_id: &str,
    other_user_id: &str,
) -> sqlx::Result<RoomRecord> {
    let mut tx = db_pool.begin().await?;

    let room: RoomRecord =
        sqlx::query_as("INSERT INTO chat_rooms (id) VALUES (?) RETURNING id,created_at")
            .bind(Uuid::now_v7().to_string())
            .fetch_one(&mut *tx)
            .await?;

    for (a, b) in [(user_id, other_user_id), (other_user_id, user_id)] {
        sqlx::query("INSERT INTO chat_users (room_id,user_id,other_user_id) VALUES (?,?,?)")
            .bind(&room.id)
            .bind(a)
            .bind(b)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(room)
}

pub async fn get_user(db_pool: &SqlitePool, user_id: &str) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as("SELECT id,name,image FROM users WHERE id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await
}
