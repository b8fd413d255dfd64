use std::{fmt, str::FromStr};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(AppError::validation(format!("unknown account status {other}"))),
        }
    }
}

/// A user or worker as seen by the messaging core. Profiles live elsewhere;
/// this is only what is needed to authenticate and to label messages.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
    pub role: String,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Person {
    pub(crate) fn unknown(id: Uuid) -> Self {
        Self {
            id,
            first_name: "Deleted".to_owned(),
            last_name: "User".to_owned(),
            profile_image: None,
            role: None,
        }
    }
}

impl From<&Account> for Person {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            profile_image: account.profile_image.clone(),
            role: Some(account.role.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
            FileKind::Other => "other",
        }
    }
}

impl FromStr for FileKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "image" => Ok(FileKind::Image),
            "pdf" => Ok(FileKind::Pdf),
            "other" => Ok(FileKind::Other),
            other => Err(AppError::validation(format!(
                "fileType must be one of image, pdf, other (got {other})"
            ))),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub url: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    pub service_id: Option<Uuid>,
    pub last_message_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn others(&self, user_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.participants.iter().copied().filter(move |p| *p != user_id)
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
    pub read_by: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Message {
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }
}

/// The last message only stands in for the whole unread set: a conversation is
/// unread when someone else wrote the last message and the caller has not read it.
pub fn is_unread(last_message: Option<&Message>, caller: Uuid) -> bool {
    match last_message {
        Some(message) => message.sender_id != caller && !message.is_read_by(caller),
        None => false,
    }
}

/// Message body as submitted by a client, before validation.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
}

impl Draft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn validate(self) -> AppResult<ValidDraft> {
        let content = self
            .content
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());

        let attachment = match self.file_url.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty()) {
            Some(url) => {
                let kind = match self.file_type.as_deref() {
                    Some(kind) => kind.parse()?,
                    None => FileKind::Other,
                };
                Some(Attachment { url, kind })
            }
            None => None,
        };

        if content.is_none() && attachment.is_none() {
            return Err(AppError::validation("Message content is required"));
        }

        Ok(ValidDraft { content, attachment })
    }
}

#[derive(Debug, Clone)]
pub struct ValidDraft {
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub conversation: Uuid,
    pub sender: Person,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<FileKind>,
    pub read_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl MessageView {
    pub fn new(message: Message, sender: Person) -> Self {
        let (file_url, file_type) = match message.attachment {
            Some(Attachment { url, kind }) => (Some(url), Some(kind)),
            None => (None, None),
        };
        Self {
            id: message.id,
            conversation: message.conversation_id,
            sender,
            content: message.content,
            file_url,
            file_type,
            read_by: message.read_by,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: Option<String>,
    pub sender: Uuid,
    pub read_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            sender: message.sender_id,
            read_by: message.read_by.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub participants: Vec<Person>,
    pub other_participants: Vec<Person>,
    pub last_message: Option<LastMessage>,
    pub service: Option<Uuid>,
    pub unread: bool,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ConversationView {
    pub fn new(
        conversation: &Conversation,
        participants: Vec<Person>,
        last_message: Option<&Message>,
        caller: Uuid,
    ) -> Self {
        let other_participants = participants
            .iter()
            .filter(|p| p.id != caller)
            .cloned()
            .collect();
        Self {
            id: conversation.id,
            participants,
            other_participants,
            last_message: last_message.map(LastMessage::from),
            service: conversation.service_id,
            unread: is_unread(last_message, caller),
            is_active: conversation.is_active,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}
