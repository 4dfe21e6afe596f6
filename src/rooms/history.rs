use axum::{Json, debug_handler, extract::{Path, Query, State}};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::db::EnrichedMessage;
use crate::{AppResult, storage};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    page: Option<u32>,
}

#[debug_handler]
pub(crate) async fn messages(
    Path(room_id): Path<String>,
    Query(HistoryQuery { page }): Query<HistoryQuery>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<EnrichedMessage>>> {
    let page = page.unwrap_or(0);
    let messages = storage::list_messages(&db_pool, &room_id, page).await?;
    Ok(Json(messages))
}
