use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{auth::CurrentUser, delivery::Messenger, extract::AppPath, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn archive_conversation(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Value>> {
    messenger.archive(account.id, id).await?;
    Ok(Json(json!({ "message": "Conversation archived successfully" })))
}
