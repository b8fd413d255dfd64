use axum::{debug_handler, extract::State, Json};

use crate::{auth::CurrentUser, delivery::Messenger, models::ConversationView, AppResult};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_conversations(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Vec<ConversationView>>> {
    Ok(Json(messenger.list_conversations(account.id).await?))
}
