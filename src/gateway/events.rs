use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    models::{FileKind, MessageView, Person},
    AppResult,
};

/// Everything the server pushes down a gateway connection, framed as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserJoined(UserJoined),
    UserLeft(UserLeft),
    NewMessage(NewMessage),
    UserTyping(UserTyping),
    MessageRead(MessageRead),
    UserStatus(UserStatus),
    MessageNotification(MessageNotification),
    NewConversation(NewConversation),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        use ServerEvent::*;
        match self {
            UserJoined(_) => "user_joined",
            UserLeft(_) => "user_left",
            NewMessage(_) => "new_message",
            UserTyping(_) => "user_typing",
            MessageRead(_) => "message_read",
            UserStatus(_) => "user_status",
            MessageNotification(_) => "message_notification",
            NewConversation(_) => "new_conversation",
        }
    }

    pub fn frame(&self) -> AppResult<Utf8Bytes> {
        Ok(serde_json::to_string(self)?.into())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    #[serde(flatten)]
    pub message: MessageView,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_id: Uuid,
    pub typing: bool,
    pub first_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRead {
    pub user_id: Uuid,
    pub message_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: Uuid,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNotification {
    pub conversation_id: Uuid,
    pub message: NotifiedMessage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedMessage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: Option<String>,
    pub file_type: Option<FileKind>,
    pub sender: Person,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConversation {
    pub conversation: Uuid,
    pub sender: Uuid,
    pub message: String,
}

impl ServerEvent {
    pub fn new_message(message: &MessageView) -> ServerEvent {
        ServerEvent::NewMessage(NewMessage {
            message: message.clone(),
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    pub fn message_notification(message: &MessageView) -> ServerEvent {
        ServerEvent::MessageNotification(MessageNotification {
            conversation_id: message.conversation,
            message: NotifiedMessage {
                id: message.id,
                content: message.content.clone(),
                file_type: message.file_type,
                sender: message.sender.clone(),
                created_at: message.created_at,
            },
        })
    }

    pub fn message_read(user_id: Uuid, message_ids: Vec<Uuid>) -> ServerEvent {
        ServerEvent::MessageRead(MessageRead {
            user_id,
            message_ids,
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    pub fn user_status(user_id: Uuid, status: Status) -> ServerEvent {
        ServerEvent::UserStatus(UserStatus {
            user_id,
            status,
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn frames_carry_the_wire_event_name() {
        let user_id = Uuid::now_v7();
        let frame = ServerEvent::user_status(user_id, Status::Offline).frame().unwrap();
        let value: Value = serde_json::from_str(frame.as_str()).unwrap();

        assert_eq!(value["event"], "user_status");
        assert_eq!(value["data"]["userId"], user_id.to_string());
        assert_eq!(value["data"]["status"], "offline");
        assert!(value["data"]["timestamp"].is_string());
    }

    #[test]
    fn new_message_flattens_the_message_next_to_the_timestamp() {
        let sender = Person {
            id: Uuid::now_v7(),
            first_name: "Omar".to_owned(),
            last_name: "Said".to_owned(),
            profile_image: None,
            role: None,
        };
        let view = MessageView {
            id: Uuid::now_v7(),
            conversation: Uuid::now_v7(),
            sender: sender.clone(),
            content: Some("hi".to_owned()),
            file_url: None,
            file_type: None,
            read_by: vec![sender.id],
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };

        let value: Value = serde_json::to_value(ServerEvent::new_message(&view)).unwrap();
        assert_eq!(value["event"], "new_message");
        assert_eq!(value["data"]["_id"], view.id.to_string());
        assert_eq!(value["data"]["sender"]["firstName"], "Omar");
        assert_eq!(value["data"]["readBy"][0], sender.id.to_string());
        assert!(value["data"]["timestamp"].is_string());
    }
}
