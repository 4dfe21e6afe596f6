use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::RoomRecord;
use crate::{AppResult, storage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewRoomQuery {
    user_id: String,
    other_user_id: String,
}

#[debug_handler]
pub(crate) async fn create_or_get_room(
    State(db_pool): State<SqlitePool>,
    Json(NewRoomQuery { user_id, other_user_id }): Json<NewRoomQuery>,
) -> AppResult<Json<RoomRecord>> {
    let room = storage::create_or_get_room(&db_pool, &user_id, &other_user_id).await?;
    Ok(Json(room))
}
