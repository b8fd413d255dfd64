use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::CurrentUser, delivery::Messenger, extract::AppJson, models::ConversationView, AppError,
    AppResult,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewConversationBody {
    participant_id: Option<Uuid>,
    service_id: Option<Uuid>,
    initial_message: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_conversation(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,

    AppJson(NewConversationBody { participant_id, service_id, initial_message }): AppJson<NewConversationBody>,
) -> AppResult<(StatusCode, Json<ConversationView>)> {
    let participant_id =
        participant_id.ok_or_else(|| AppError::validation("Participant ID is required"))?;

    let conversation = messenger
        .start_conversation(&account, participant_id, service_id, initial_message)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}
