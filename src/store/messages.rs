use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::{
    models::{from_millis, now_millis, Attachment, Message, ValidDraft},
    AppResult,
};

use super::{parse_id, Store};

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    content: Option<String>,
    file_url: Option<String>,
    file_type: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl MessageRow {
    fn into_message(self, readers: &mut HashMap<Uuid, Vec<Uuid>>) -> AppResult<Message> {
        let id = parse_id(&self.id)?;
        let attachment = match self.file_url {
            Some(url) => Some(Attachment {
                url,
                kind: self.file_type.as_deref().unwrap_or("other").parse()?,
            }),
            None => None,
        };
        Ok(Message {
            id,
            conversation_id: parse_id(&self.conversation_id)?,
            sender_id: parse_id(&self.sender_id)?,
            content: self.content,
            attachment,
            read_by: readers.remove(&id).unwrap_or_default(),
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        })
    }
}

const MESSAGE_COLUMNS: &str = "id,conversation_id,sender_id,content,file_url,file_type,created_at,updated_at";

/// Which of a conversation's messages a read-marking call may touch.
#[derive(Debug, Clone)]
pub enum ReadScope {
    All,
    Only(Vec<Uuid>),
}

impl Store {
    /// Writes the message, the sender's own read mark and the conversation's
    /// last-message pointer in one transaction.
    pub async fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        draft: ValidDraft,
    ) -> AppResult<Message> {
        let id = Uuid::now_v7();
        let now = now_millis();
        let (file_url, file_type) = match &draft.attachment {
            Some(attachment) => (Some(attachment.url.clone()), Some(attachment.kind.as_str())),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO messages (id,conversation_id,sender_id,content,file_url,file_type,created_at,updated_at) VALUES (?,?,?,?,?,?,?,?)")
            .bind(id.to_string())
            .bind(conversation_id.to_string())
            .bind(sender_id.to_string())
            .bind(&draft.content)
            .bind(file_url)
            .bind(file_type)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO message_reads (message_id,user_id) VALUES (?,?)")
            .bind(id.to_string())
            .bind(sender_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE conversations SET last_message_id=?, updated_at=? WHERE id=?")
            .bind(id.to_string())
            .bind(now)
            .bind(conversation_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Message {
            id,
            conversation_id,
            sender_id,
            content: draft.content,
            attachment: draft.attachment,
            read_by: vec![sender_id],
            created_at: from_millis(now),
            updated_at: from_millis(now),
        })
    }

    pub async fn message(&self, id: Uuid) -> AppResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id=?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut readers = self.readers_of(&[parse_id(&row.id)?]).await?;
        Ok(Some(row.into_message(&mut readers)?))
    }

    /// Whole history, oldest first.
    pub async fn messages_for(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id=? ORDER BY created_at, id"
        ))
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        self.with_readers(rows).await
    }

    /// Page `page` (1-based) counted back from the newest message, returned
    /// oldest first.
    pub async fn message_page(
        &self,
        conversation_id: Uuid,
        page: u32,
        limit: u32,
    ) -> AppResult<Vec<Message>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let mut rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id=?
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(conversation_id.to_string())
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.reverse();

        self.with_readers(rows).await
    }

    pub async fn count_messages(&self, conversation_id: Uuid) -> AppResult<u64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id=?")
            .bind(conversation_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(total as u64)
    }

    async fn with_readers(&self, rows: Vec<MessageRow>) -> AppResult<Vec<Message>> {
        let ids = rows
            .iter()
            .map(|row| parse_id(&row.id))
            .collect::<AppResult<Vec<_>>>()?;
        let mut readers = self.readers_of(&ids).await?;
        rows.into_iter()
            .map(|row| row.into_message(&mut readers))
            .collect()
    }

    pub async fn readers_of(&self, message_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<Uuid>>> {
        let mut readers: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if message_ids.is_empty() {
            return Ok(readers);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT message_id,user_id FROM message_reads WHERE message_id IN (",
        );
        let mut ids = query.separated(",");
        for id in message_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(") ORDER BY rowid");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;
        for (message_id, user_id) in rows {
            readers
                .entry(parse_id(&message_id)?)
                .or_default()
                .push(parse_id(&user_id)?);
        }
        Ok(readers)
    }

    /// Adds `reader` to every message in scope that someone else sent and
    /// `reader` has not read yet. Returns the ids this call actually changed.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader: Uuid,
        scope: &ReadScope,
    ) -> AppResult<Vec<Uuid>> {
        let candidates: Vec<(String,)> = sqlx::query_as(
            "SELECT m.id FROM messages m
             WHERE m.conversation_id=? AND m.sender_id<>?
               AND NOT EXISTS (SELECT 1 FROM message_reads r WHERE r.message_id=m.id AND r.user_id=?)
             ORDER BY m.created_at, m.id",
        )
        .bind(conversation_id.to_string())
        .bind(reader.to_string())
        .bind(reader.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = candidates
            .iter()
            .map(|(id,)| parse_id(id))
            .collect::<AppResult<Vec<_>>>()?;
        if let ReadScope::Only(ids) = scope {
            candidates.retain(|id| ids.contains(id));
        }
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let mut updated = Vec::with_capacity(candidates.len());
        let mut tx = self.pool.begin().await?;
        for id in candidates {
            let result = sqlx::query("INSERT OR IGNORE INTO message_reads (message_id,user_id) VALUES (?,?)")
                .bind(id.to_string())
                .bind(reader.to_string())
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                updated.push(id);
            }
        }
        tx.commit().await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Draft;

    async fn conversation(store: &Store) -> (Uuid, Uuid, Uuid) {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let (conversation, _) = store.find_or_create_conversation(a, b, None).await.unwrap();
        (conversation.id, a, b)
    }

    #[tokio::test]
    async fn insert_marks_sender_and_moves_pointer() {
        let store = Store::memory().await.unwrap();
        let (conversation_id, a, _) = conversation(&store).await;

        let message = store
            .insert_message(conversation_id, a, Draft::text("hi").validate().unwrap())
            .await
            .unwrap();

        let loaded = store.message(message.id).await.unwrap().unwrap();
        assert_eq!(loaded.read_by, vec![a]);
        assert_eq!(loaded.content.as_deref(), Some("hi"));
        let conversation = store.conversation(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.last_message_id, Some(message.id));
    }

    #[tokio::test]
    async fn pages_count_back_from_newest_and_read_oldest_first() {
        let store = Store::memory().await.unwrap();
        let (conversation_id, a, _) = conversation(&store).await;

        let mut sent = Vec::new();
        for n in 0..5 {
            let draft = Draft::text(format!("m{n}")).validate().unwrap();
            sent.push(store.insert_message(conversation_id, a, draft).await.unwrap().id);
        }

        let newest = store.message_page(conversation_id, 1, 2).await.unwrap();
        assert_eq!(newest.iter().map(|m| m.id).collect::<Vec<_>>(), sent[3..].to_vec());
        let oldest = store.message_page(conversation_id, 3, 2).await.unwrap();
        assert_eq!(oldest.iter().map(|m| m.id).collect::<Vec<_>>(), sent[..1].to_vec());
        assert_eq!(store.count_messages(conversation_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn mark_read_skips_own_and_already_read() {
        let store = Store::memory().await.unwrap();
        let (conversation_id, a, b) = conversation(&store).await;

        let from_a = store
            .insert_message(conversation_id, a, Draft::text("from a").validate().unwrap())
            .await
            .unwrap();
        store
            .insert_message(conversation_id, b, Draft::text("from b").validate().unwrap())
            .await
            .unwrap();

        assert_eq!(store.mark_read(conversation_id, b, &ReadScope::All).await.unwrap(), vec![from_a.id]);
        assert!(store.mark_read(conversation_id, b, &ReadScope::All).await.unwrap().is_empty());

        let readers = store.readers_of(&[from_a.id]).await.unwrap();
        assert_eq!(readers[&from_a.id], vec![a, b]);
    }

    #[tokio::test]
    async fn scoped_mark_read_leaves_other_messages_alone() {
        let store = Store::memory().await.unwrap();
        let (conversation_id, a, b) = conversation(&store).await;

        let first = store
            .insert_message(conversation_id, a, Draft::text("1").validate().unwrap())
            .await
            .unwrap();
        let second = store
            .insert_message(conversation_id, a, Draft::text("2").validate().unwrap())
            .await
            .unwrap();

        let updated = store
            .mark_read(conversation_id, b, &ReadScope::Only(vec![second.id]))
            .await
            .unwrap();
        assert_eq!(updated, vec![second.id]);
        assert!(!store.message(first.id).await.unwrap().unwrap().is_read_by(b));
    }
}
