use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::db::{now_timestamp, RepositoryError};
use crate::ids::{ConversationId, MessageId, ProfileId};
use crate::messages::domain::{LastMessage, Message, NewMessage};
use crate::state::DbPool;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append to the conversation's log. Rows are never updated afterwards.
    async fn append(&self, message: &NewMessage) -> Result<Message, RepositoryError>;

    async fn last_message(
        &self,
        conversation: &ConversationId,
    ) -> Result<LastMessage, RepositoryError>;

    /// Oldest first.
    async fn list_for_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError>;
}

pub type DynMessageRepository = Arc<dyn MessageRepository>;

pub struct SqliteMessageRepository {
    pool: DbPool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) const MESSAGE_COLUMNS: &str =
    "m.id, m.conversation_id, m.sender_id, m.text, m.attachment_url, m.created_at";

/// Read a message whose `MESSAGE_COLUMNS` start at `offset` in the row.
pub(crate) fn message_at(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId::new(row.get::<_, String>(offset)?),
        conversation: ConversationId::new(row.get::<_, String>(offset + 1)?),
        sender: ProfileId::new(row.get::<_, String>(offset + 2)?),
        text: row.get(offset + 3)?,
        attachment_url: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
    })
}

pub(crate) fn list_in(
    conn: &Connection,
    conversation: &ConversationId,
) -> rusqlite::Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages m WHERE m.conversation_id = ?1 ORDER BY m.seq",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let messages = stmt
        .query_map(params![conversation.as_str()], |row| message_at(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn append(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let conn = self.pool.get()?;
        let created_at = now_timestamp();
        let (attachment_name, attachment_url) = match &message.attachment {
            Some(a) => (Some(a.file_name.clone()), Some(a.url.clone())),
            None => (None, None),
        };

        conn.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, text, attachment_name,
                                   attachment_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.as_str(),
                message.conversation.as_str(),
                message.sender.as_str(),
                message.text,
                attachment_name,
                attachment_url,
                created_at,
            ],
        )?;

        Ok(Message {
            id: message.id.clone(),
            conversation: message.conversation.clone(),
            sender: message.sender.clone(),
            text: message.text.clone(),
            attachment_url,
            created_at,
        })
    }

    async fn last_message(
        &self,
        conversation: &ConversationId,
    ) -> Result<LastMessage, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM messages m WHERE m.conversation_id = ?1
             ORDER BY m.seq DESC LIMIT 1",
            MESSAGE_COLUMNS
        );
        let message = conn
            .query_row(&sql, params![conversation.as_str()], |row| message_at(row, 0))
            .optional()?;
        Ok(message.into())
    }

    async fn list_for_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(list_in(&conn, conversation)?)
    }
}
