use axum::{debug_handler, extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    delivery::Messenger,
    extract::AppPath,
    models::{ConversationView, MessageView},
    AppResult,
};

#[derive(Serialize)]
pub(crate) struct ConversationDetail {
    conversation: ConversationView,
    messages: Vec<MessageView>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn show_conversation(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ConversationDetail>> {
    let (conversation, messages) = messenger.conversation_with_history(account.id, id).await?;
    Ok(Json(ConversationDetail { conversation, messages }))
}
