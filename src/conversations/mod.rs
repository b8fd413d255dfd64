mod archive;
mod list;
mod new;
mod show;

use axum::{
    routing::{get, put},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_conversations).post(new::new_conversation))
        .route("/{id}", get(show::show_conversation))
        .route("/{id}/archive", put(archive::archive_conversation))
}
