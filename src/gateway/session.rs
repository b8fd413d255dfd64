use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    broadcast::{Broadcaster, ConnectionId, Room},
    delivery::Messenger,
    models::{Account, Draft},
    AppError, AppResult, GetField,
};

use super::{
    events::{ServerEvent, UserJoined, UserLeft, UserTyping},
    Hub,
};

#[derive(Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// One authenticated connection's event handlers. Every handler failure is
/// logged and dropped here; nothing propagates back down the channel.
pub(crate) struct Session {
    pub(crate) conn: ConnectionId,
    pub(crate) account: Account,
    pub(crate) hub: Hub,
    messenger: Messenger,
}

impl Session {
    pub(crate) fn new(account: Account, hub: Hub, messenger: Messenger) -> Session {
        Session {
            conn: ConnectionId::new(),
            account,
            hub,
            messenger,
        }
    }

    pub(crate) async fn dispatch(&self, text: &str) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(conn = %self.conn, error = %err, "unreadable gateway frame");
                return;
            }
        };

        let result = match frame.event.as_str() {
            "join_conversation" => self.join_conversation(&frame.data).await,
            "leave_conversation" => self.leave_conversation(&frame.data),
            "send_message" => self.send_message(&frame.data).await,
            "typing" => self.typing(&frame.data),
            "mark_read" => self.mark_read(&frame.data),
            "user_activity" => {
                self.hub.touch(self.conn);
                Ok(())
            }
            other => {
                tracing::debug!(conn = %self.conn, event = other, "unknown gateway event");
                Ok(())
            }
        };

        if let Err(err) = result {
            tracing::warn!(
                conn = %self.conn,
                user = %self.account.id,
                event = %frame.event,
                error = %err,
                "gateway event dropped"
            );
        }
    }

    async fn join_conversation(&self, data: &Value) -> AppResult<()> {
        let conversation_id = conversation_ref(data)?;
        self.messenger
            .require_participant(self.account.id, conversation_id)
            .await?;

        self.hub.join(self.conn, conversation_id);
        tracing::debug!(conn = %self.conn, conversation = %conversation_id, "joined conversation");
        self.hub.emit_to_room(
            Room::Conversation(conversation_id),
            &ServerEvent::UserJoined(UserJoined {
                user_id: self.account.id,
                first_name: self.account.first_name.clone(),
                last_name: self.account.last_name.clone(),
                timestamp: OffsetDateTime::now_utc(),
            }),
            Some(self.conn),
        );
        Ok(())
    }

    fn leave_conversation(&self, data: &Value) -> AppResult<()> {
        let conversation_id = conversation_ref(data)?;

        // announce while still a member; the hub drops relays from outside the room
        self.hub.emit_to_room(
            Room::Conversation(conversation_id),
            &ServerEvent::UserLeft(UserLeft {
                user_id: self.account.id,
                timestamp: OffsetDateTime::now_utc(),
            }),
            Some(self.conn),
        );
        self.hub.leave(self.conn, conversation_id);
        tracing::debug!(conn = %self.conn, conversation = %conversation_id, "left conversation");
        Ok(())
    }

    async fn send_message(&self, data: &Value) -> AppResult<()> {
        let conversation_id = parse_conversation(&data.get_str_field("conversation")?)?;
        let draft = Draft {
            content: data.get_opt_str_field("content")?,
            file_url: data.get_opt_str_field("fileUrl")?,
            file_type: data.get_opt_str_field("fileType")?,
        };

        self.messenger
            .deliver_message(&self.account, conversation_id, draft)
            .await?;
        Ok(())
    }

    fn typing(&self, data: &Value) -> AppResult<()> {
        let conversation_id = parse_conversation(&data.get_str_field("conversation")?)?;
        let typing = data.get("typing").and_then(Value::as_bool).unwrap_or(false);

        self.hub.emit_to_room(
            Room::Conversation(conversation_id),
            &ServerEvent::UserTyping(UserTyping {
                user_id: self.account.id,
                typing,
                first_name: self.account.first_name.clone(),
                timestamp: OffsetDateTime::now_utc(),
            }),
            Some(self.conn),
        );
        Ok(())
    }

    // live hint only; the durable read state goes through the REST path
    fn mark_read(&self, data: &Value) -> AppResult<()> {
        let conversation_id = parse_conversation(&data.get_str_field("conversation")?)?;
        let message_ids = message_refs(data)?;

        self.hub.emit_to_room(
            Room::Conversation(conversation_id),
            &ServerEvent::message_read(self.account.id, message_ids),
            Some(self.conn),
        );
        Ok(())
    }
}

fn parse_conversation(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation(format!("{raw} is not a conversation id")))
}

/// `join_conversation`/`leave_conversation` carry the bare id; objects with
/// `conversation` or `conversationId` are accepted too.
fn conversation_ref(data: &Value) -> AppResult<Uuid> {
    let raw = match data.as_str() {
        Some(raw) => raw.to_owned(),
        None => data
            .get_str_field("conversation")
            .or_else(|_| data.get_str_field("conversationId"))?,
    };
    parse_conversation(&raw)
}

fn message_refs(data: &Value) -> AppResult<Vec<Uuid>> {
    let raw: Vec<&str> = match data.get("messageIds").and_then(Value::as_array) {
        Some(ids) => ids.iter().filter_map(Value::as_str).collect(),
        None => data.get("messageId").and_then(Value::as_str).into_iter().collect(),
    };
    if raw.is_empty() {
        return Err(AppError::validation("expected messageIds or messageId"));
    }
    raw.into_iter()
        .map(|id| Uuid::parse_str(id).map_err(|_| AppError::validation(format!("{id} is not a message id"))))
        .collect()
}
