use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::CurrentUser, delivery::Messenger, extract::AppPath, store::ReadScope, AppResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
    AppPath(conversation_id): AppPath<Uuid>,
) -> AppResult<Json<Value>> {
    let updated = messenger
        .mark_read(account.id, conversation_id, ReadScope::All)
        .await?;
    Ok(Json(json!({ "message": "Messages marked as read", "count": updated.len() })))
}
