use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    models::{from_millis, now_millis, Conversation},
    AppError, AppResult,
};

use super::{parse_id, parse_opt_id, Store};

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    service_id: Option<String>,
    last_message_id: Option<String>,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

const CONVERSATION_COLUMNS: &str = "id,service_id,last_message_id,is_active,created_at,updated_at";

impl Store {
    async fn hydrate(&self, row: ConversationRow) -> AppResult<Conversation> {
        let participants: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM conversation_participants WHERE conversation_id=? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Conversation {
            id: parse_id(&row.id)?,
            participants: participants
                .iter()
                .map(|(id,)| parse_id(id))
                .collect::<AppResult<_>>()?,
            service_id: parse_opt_id(row.service_id)?,
            last_message_id: parse_opt_id(row.last_message_id)?,
            is_active: row.is_active,
            created_at: from_millis(row.created_at),
            updated_at: from_millis(row.updated_at),
        })
    }

    pub async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id=?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// The two-person conversation between `a` and `b` scoped to exactly this
    /// listing (or to no listing), archived or not.
    pub async fn find_conversation(
        &self,
        a: Uuid,
        b: Uuid,
        service_id: Option<Uuid>,
    ) -> AppResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c
             WHERE c.service_id IS ?
               AND (SELECT COUNT(*) FROM conversation_participants p WHERE p.conversation_id=c.id) = 2
               AND EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id=c.id AND p.user_id=?)
               AND EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id=c.id AND p.user_id=?)
             ORDER BY c.created_at, c.id
             LIMIT 1"
        ))
        .bind(service_id.map(|id| id.to_string()))
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn create_conversation(
        &self,
        participants: &[Uuid],
        service_id: Option<Uuid>,
    ) -> AppResult<Conversation> {
        let unique: HashSet<&Uuid> = participants.iter().collect();
        if participants.len() < 2 || unique.len() != participants.len() {
            return Err(AppError::validation(
                "a conversation needs at least two distinct participants",
            ));
        }

        let id = Uuid::now_v7();
        let now = now_millis();

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO conversations (id,service_id,last_message_id,is_active,created_at,updated_at) VALUES (?,?,NULL,1,?,?)")
            .bind(id.to_string())
            .bind(service_id.map(|id| id.to_string()))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        for (position, user_id) in participants.iter().enumerate() {
            sqlx::query("INSERT INTO conversation_participants (conversation_id,user_id,position) VALUES (?,?,?)")
                .bind(id.to_string())
                .bind(user_id.to_string())
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(Conversation {
            id,
            participants: participants.to_vec(),
            service_id,
            last_message_id: None,
            is_active: true,
            created_at: from_millis(now),
            updated_at: from_millis(now),
        })
    }

    /// Lookup-before-create for a pair. Returns the conversation and whether it
    /// was created by this call. A matching archived conversation is revived.
    pub async fn find_or_create_conversation(
        &self,
        creator: Uuid,
        participant: Uuid,
        service_id: Option<Uuid>,
    ) -> AppResult<(Conversation, bool)> {
        let _guard = self.create_lock.lock().await;

        if let Some(mut existing) = self.find_conversation(creator, participant, service_id).await? {
            if !existing.is_active {
                self.set_active(existing.id, true).await?;
                existing.is_active = true;
            }
            return Ok((existing, false));
        }

        let created = self
            .create_conversation(&[creator, participant], service_id)
            .await?;
        tracing::info!(conversation = %created.id, %creator, %participant, "conversation created");
        Ok((created, true))
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        sqlx::query("UPDATE conversations SET is_active=? WHERE id=?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c
             WHERE c.is_active=1
               AND EXISTS (SELECT 1 FROM conversation_participants p WHERE p.conversation_id=c.id AND p.user_id=?)
             ORDER BY c.updated_at DESC, c.id DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(self.hydrate(row).await?);
        }
        Ok(conversations)
    }
}
