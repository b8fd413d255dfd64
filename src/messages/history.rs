use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    delivery::Messenger,
    extract::{AppPath, AppQuery},
    models::MessageView,
    AppResult,
};

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub(crate) struct Pagination {
    total: u64,
    page: u32,
    pages: u64,
}

#[derive(Serialize)]
pub(crate) struct History {
    messages: Vec<MessageView>,
    pagination: Pagination,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn message_history(
    State(messenger): State<Messenger>,
    CurrentUser(account): CurrentUser,
    AppPath(conversation_id): AppPath<Uuid>,
    AppQuery(HistoryQuery { page, limit }): AppQuery<HistoryQuery>,
) -> AppResult<Json<History>> {
    let page = messenger
        .history(account.id, conversation_id, page, limit)
        .await?;

    Ok(Json(History {
        messages: page.messages,
        pagination: Pagination {
            total: page.total,
            page: page.page,
            pages: page.pages,
        },
    }))
}
