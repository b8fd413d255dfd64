use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use crate::{
    broadcast::{Broadcaster, Room},
    gateway::events::{NewConversation, ServerEvent},
    models::{Account, Conversation, ConversationView, Draft, Message, MessageView, Person, ValidDraft},
    store::{ReadScope, Store},
    AppError, AppResult,
};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Who hears about a freshly persisted message besides its conversation room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Room,
    // first contact: the other side has not joined the room yet
    RoomAndParticipants,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub messages: Vec<MessageView>,
    pub total: u64,
    pub page: u32,
    pub pages: u64,
}

/// The one place messages get persisted and announced, whichever entry point
/// the request came through.
#[derive(Clone)]
pub struct Messenger {
    store: Store,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Messenger {
    pub fn new(store: Store, broadcaster: Arc<dyn Broadcaster>) -> Messenger {
        Messenger { store, broadcaster }
    }

    pub async fn require_participant(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;

        if !conversation.has_participant(user_id) {
            return Err(AppError::forbidden("Not authorized to access this conversation"));
        }
        Ok(conversation)
    }

    /// Check membership, persist, then announce. Persistence must commit before
    /// anything is broadcast; a broadcast that reaches nobody is not an error.
    pub async fn deliver_message(
        &self,
        sender: &Account,
        conversation_id: Uuid,
        draft: Draft,
    ) -> AppResult<MessageView> {
        let draft = draft.validate()?;
        let conversation = self.require_participant(sender.id, conversation_id).await?;

        let message = self.persist(sender, &conversation, draft).await?;
        self.announce(&conversation, &message, Audience::Room);
        Ok(message)
    }

    async fn persist(
        &self,
        sender: &Account,
        conversation: &Conversation,
        draft: ValidDraft,
    ) -> AppResult<MessageView> {
        let message = self
            .store
            .insert_message(conversation.id, sender.id, draft)
            .await?;
        tracing::debug!(
            message = %message.id,
            conversation = %conversation.id,
            sender = %sender.id,
            "message stored"
        );
        Ok(MessageView::new(message, Person::from(sender)))
    }

    fn announce(&self, conversation: &Conversation, message: &MessageView, audience: Audience) {
        let sender_id = message.sender.id;
        let mut rooms = vec![Room::Conversation(conversation.id)];
        if audience == Audience::RoomAndParticipants {
            rooms.extend(conversation.others(sender_id).map(Room::User));
        }
        self.broadcaster
            .emit(&rooms, &ServerEvent::new_message(message), None);

        let notification = ServerEvent::message_notification(message);
        for participant in conversation.others(sender_id) {
            self.broadcaster.emit_to_user(participant, &notification);
        }
    }

    /// Finds or creates the pair's conversation and optionally opens it with a
    /// first message.
    pub async fn start_conversation(
        &self,
        creator: &Account,
        participant_id: Uuid,
        service_id: Option<Uuid>,
        initial_message: Option<String>,
    ) -> AppResult<ConversationView> {
        if participant_id == creator.id {
            return Err(AppError::validation("Cannot start a conversation with yourself"));
        }
        let draft = match initial_message.filter(|m| !m.trim().is_empty()) {
            Some(text) => Some(Draft::text(text).validate()?),
            None => None,
        };

        self.store
            .account(participant_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let (conversation, _) = self
            .store
            .find_or_create_conversation(creator.id, participant_id, service_id)
            .await?;

        if let Some(draft) = draft {
            let message = self.persist(creator, &conversation, draft).await?;
            self.broadcaster.emit_to_user(
                participant_id,
                &ServerEvent::NewConversation(NewConversation {
                    conversation: conversation.id,
                    sender: creator.id,
                    message: message.content.clone().unwrap_or_default(),
                }),
            );
            self.announce(&conversation, &message, Audience::RoomAndParticipants);
        }

        self.conversation_view(conversation.id, creator.id).await
    }

    /// Adds the reader to every unread message in scope and, when anything
    /// changed, tells the room which messages.
    pub async fn mark_read(
        &self,
        reader_id: Uuid,
        conversation_id: Uuid,
        scope: ReadScope,
    ) -> AppResult<Vec<Uuid>> {
        self.require_participant(reader_id, conversation_id).await?;

        let updated = self
            .store
            .mark_read(conversation_id, reader_id, &scope)
            .await?;
        if !updated.is_empty() {
            self.broadcaster.emit_to_room(
                Room::Conversation(conversation_id),
                &ServerEvent::message_read(reader_id, updated.clone()),
                None,
            );
        }
        Ok(updated)
    }

    async fn conversation_view(&self, conversation_id: Uuid, caller: Uuid) -> AppResult<ConversationView> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;
        self.view_of(&conversation, caller).await
    }

    async fn view_of(&self, conversation: &Conversation, caller: Uuid) -> AppResult<ConversationView> {
        let participants = self.store.people(&conversation.participants).await?;
        let last_message = match conversation.last_message_id {
            Some(id) => self.store.message(id).await?,
            None => None,
        };
        Ok(ConversationView::new(conversation, participants, last_message.as_ref(), caller))
    }

    pub async fn list_conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationView>> {
        let conversations = self.store.conversations_for(user_id).await?;
        let mut views = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            views.push(self.view_of(conversation, user_id).await?);
        }
        Ok(views)
    }

    async fn message_views(&self, messages: Vec<Message>) -> AppResult<Vec<MessageView>> {
        let mut senders: HashMap<Uuid, Person> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = match senders.get(&message.sender_id) {
                Some(person) => person.clone(),
                None => {
                    let person = self
                        .store
                        .people(&[message.sender_id])
                        .await?
                        .pop()
                        .unwrap_or_else(|| Person::unknown(message.sender_id));
                    senders.insert(message.sender_id, person.clone());
                    person
                }
            };
            views.push(MessageView::new(message, sender));
        }
        Ok(views)
    }

    /// The conversation and its whole history; opening it reads it.
    pub async fn conversation_with_history(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<(ConversationView, Vec<MessageView>)> {
        let conversation = self.require_participant(user_id, conversation_id).await?;
        let messages = self.store.messages_for(conversation_id).await?;

        let updated = self.mark_read(user_id, conversation_id, ReadScope::All).await?;
        let mut messages = self.message_views(messages).await?;
        include_reader(&mut messages, &updated, user_id);

        let view = self.view_of(&conversation, user_id).await?;
        Ok((view, messages))
    }

    /// One page of history. Only the messages on the page are marked read.
    pub async fn history(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> AppResult<Page> {
        self.require_participant(user_id, conversation_id).await?;
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

        let messages = self.store.message_page(conversation_id, page, limit).await?;
        let total = self.store.count_messages(conversation_id).await?;

        let on_page = messages.iter().map(|m| m.id).collect();
        let updated = self
            .mark_read(user_id, conversation_id, ReadScope::Only(on_page))
            .await?;
        let mut messages = self.message_views(messages).await?;
        include_reader(&mut messages, &updated, user_id);

        Ok(Page {
            messages,
            total,
            page,
            pages: total.div_ceil(u64::from(limit)),
        })
    }

    pub async fn archive(&self, user_id: Uuid, conversation_id: Uuid) -> AppResult<()> {
        self.require_participant(user_id, conversation_id).await?;
        self.store.set_active(conversation_id, false).await?;
        tracing::info!(conversation = %conversation_id, user = %user_id, "conversation archived");
        Ok(())
    }
}

fn include_reader(messages: &mut [MessageView], updated: &[Uuid], reader: Uuid) {
    for message in messages.iter_mut() {
        if updated.contains(&message.id) && !message.read_by.contains(&reader) {
            message.read_by.push(reader);
        }
    }
}
