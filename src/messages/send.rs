use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    delivery::Messenger,
    extract::{AppJson, AppPath},
    models::{Draft, MessageView},
    AppResult,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageBody {
    content: Option<String>,
    file_url: Option<String>,
    file_type: Option<String>,
}

/// Same path as the gateway's `send_message`: stored first, then announced.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_message(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
    AppPath(conversation_id): AppPath<Uuid>,

    AppJson(SendMessageBody { content, file_url, file_type }): AppJson<SendMessageBody>,
) -> AppResult<(StatusCode, Json<MessageView>)> {
    let message = messenger
        .deliver_message(&account, conversation_id, Draft { content, file_url, file_type })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
