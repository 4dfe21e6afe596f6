use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use sqlx::SqlitePool;

use crate::{AppResult, AppState, storage};

pub fn router() -> Router<AppState> {
    Router::new().route("/{user_id}", get(profile))
}

#[debug_handler]
pub(crate) async fn profile(
    Path(user_id): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    match storage::get_user(&db_pool, &user_id).await? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
