mod history;
mod read;
mod send;

use axum::{
    routing::{get, put},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{conversation_id}", get(history::message_history).post(send::send_message))
        .route("/{conversation_id}/read", put(read::mark_read))
}
