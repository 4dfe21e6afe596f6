mod history;
mod new;

use axum::{Router, routing::{get, post}};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::create_or_get_room))
        .route("/{room_id}/messages", get(history::messages))
}
