// Repository pattern - conversation registry side effects
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;

use crate::conversations::domain::{Conversation, ConversationSummary};
use crate::db::{now_timestamp, RepositoryError};
use crate::ids::{ConversationId, ProfileId, ProfilePair};
use crate::messages::repository::{message_at, MESSAGE_COLUMNS};
use crate::messages::LastMessage;
use crate::state::DbPool;

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Idempotent per unordered pair. The flag is true when this call
    /// created the row; `initiator` is only recorded in that case.
    async fn get_or_create(
        &self,
        initiator: &ProfileId,
        receiver: &ProfileId,
    ) -> Result<(Conversation, bool), RepositoryError>;

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError>;

    async fn find_by_pair(&self, pair: &ProfilePair)
        -> Result<Option<Conversation>, RepositoryError>;

    /// Conversations the profile takes part in, most recent activity first.
    async fn list_for_profile(
        &self,
        profile: &ProfileId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;
}

pub type DynConversationRepository = Arc<dyn ConversationRepository>;

pub struct SqliteConversationRepository {
    pool: DbPool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId::new(row.get::<_, String>(0)?),
        initiator: ProfileId::new(row.get::<_, String>(1)?),
        receiver: ProfileId::new(row.get::<_, String>(2)?),
        created_at: row.get(3)?,
    })
}

pub(crate) fn find_by_pair_in(
    conn: &Connection,
    pair: &ProfilePair,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, initiator_id, receiver_id, created_at FROM conversations
         WHERE pair_lo = ?1 AND pair_hi = ?2",
        params![pair.lo().as_str(), pair.hi().as_str()],
        conversation_from_row,
    )
    .optional()
}

pub(crate) fn get_in(conn: &Connection, id: &ConversationId) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, initiator_id, receiver_id, created_at FROM conversations WHERE id = ?1",
        params![id.as_str()],
        conversation_from_row,
    )
    .optional()
}

/// Insert-if-absent on the canonical pair, then read back whichever row won.
/// Run inside a transaction so the caller can combine it with other writes.
pub(crate) fn get_or_create_in(
    conn: &Connection,
    initiator: &ProfileId,
    receiver: &ProfileId,
) -> Result<(Conversation, bool), RepositoryError> {
    let pair = ProfilePair::new(initiator, receiver).ok_or_else(|| {
        RepositoryError::Conflict(format!("profile {} cannot talk to itself", initiator))
    })?;

    let inserted = conn.execute(
        "INSERT INTO conversations (id, initiator_id, receiver_id, pair_lo, pair_hi, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(pair_lo, pair_hi) DO NOTHING",
        params![
            ConversationId::generate().as_str(),
            initiator.as_str(),
            receiver.as_str(),
            pair.lo().as_str(),
            pair.hi().as_str(),
            now_timestamp(),
        ],
    )?;

    let conversation = find_by_pair_in(conn, &pair)?.ok_or_else(|| {
        RepositoryError::NotFound(format!("conversation {} / {}", pair.lo(), pair.hi()))
    })?;

    Ok((conversation, inserted > 0))
}

#[async_trait]
impl ConversationRepository for SqliteConversationRepository {
    async fn get_or_create(
        &self,
        initiator: &ProfileId,
        receiver: &ProfileId,
    ) -> Result<(Conversation, bool), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = get_or_create_in(&tx, initiator, receiver)?;
        tx.commit()?;

        if result.1 {
            tracing::info!(
                "Created conversation {} between {} and {}",
                result.0.id,
                initiator,
                receiver
            );
        }
        Ok(result)
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(get_in(&conn, id)?)
    }

    async fn find_by_pair(
        &self,
        pair: &ProfilePair,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(find_by_pair_in(&conn, pair)?)
    }

    async fn list_for_profile(
        &self,
        profile: &ProfileId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let conn = self.pool.get()?;

        // Last message is picked by seq so equal timestamps cannot tie.
        let sql = format!(
            "SELECT c.id, c.initiator_id, c.receiver_id, c.created_at, {}
             FROM conversations c
             LEFT JOIN messages m ON m.seq = (
                 SELECT MAX(seq) FROM messages WHERE conversation_id = c.id
             )
             WHERE c.initiator_id = ?1 OR c.receiver_id = ?1
             ORDER BY COALESCE(m.created_at, c.created_at) DESC, c.id DESC",
            MESSAGE_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(params![profile.as_str()], |row| {
                let conversation = conversation_from_row(row)?;
                let has_message: Option<String> = row.get(4)?;
                let last_message = match has_message {
                    Some(_) => LastMessage::Some(message_at(row, 4)?),
                    None => LastMessage::None,
                };
                Ok(ConversationSummary {
                    conversation,
                    last_message,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_profile, migrated_pool};
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteConversationRepository, DbPool, TempDir) {
        let (pool, temp) = migrated_pool();
        for id in ["a", "b", "c"] {
            insert_profile(&pool, id);
        }
        (SqliteConversationRepository::new(pool.clone()), pool, temp)
    }

    fn insert_message(pool: &DbPool, conversation: &ConversationId, text: &str) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, text, created_at)
             VALUES (?1, ?2, 'a', ?3, ?4)",
            params![
                uuid::Uuid::now_v7().to_string(),
                conversation.as_str(),
                text,
                now_timestamp()
            ],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent_in_both_orders() {
        let (repo, pool, _temp) = create_test_repo();
        let a = ProfileId::new("a");
        let b = ProfileId::new("b");

        let (first, created) = repo.get_or_create(&a, &b).await.unwrap();
        assert!(created);
        assert_eq!(first.initiator, a);

        let (again, created) = repo.get_or_create(&b, &a).await.unwrap();
        assert!(!created);
        assert_eq!(again, first);

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_row() {
        let (repo, pool, _temp) = create_test_repo();
        let repo = Arc::new(repo);

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let (x, y) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                repo.get_or_create(&ProfileId::new(x), &ProfileId::new(y))
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let (conversation, was_created) = handle.await.unwrap();
            ids.push(conversation.id);
            if was_created {
                created += 1;
            }
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(created, 1);

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_self_conversation_rejected() {
        let (repo, _pool, _temp) = create_test_repo();
        let a = ProfileId::new("a");
        assert!(matches!(
            repo.get_or_create(&a, &a).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_by_last_activity() {
        let (repo, pool, _temp) = create_test_repo();
        let a = ProfileId::new("a");

        let (with_b, _) = repo.get_or_create(&a, &ProfileId::new("b")).await.unwrap();
        let (with_c, _) = repo.get_or_create(&ProfileId::new("c"), &a).await.unwrap();

        // Newest conversation first while neither has messages
        let listed = repo.list_for_profile(&a).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].conversation.id, with_c.id);
        assert!(listed[0].last_message.is_none());

        insert_message(&pool, &with_b.id, "hello b");
        let listed = repo.list_for_profile(&a).await.unwrap();
        assert_eq!(listed[0].conversation.id, with_b.id);
        assert_eq!(
            listed[0].last_message.as_message().map(|m| m.text.as_str()),
            Some("hello b")
        );

        // Only participants see it
        let for_b = repo.list_for_profile(&ProfileId::new("b")).await.unwrap();
        assert_eq!(for_b.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_pair_and_get() {
        let (repo, _pool, _temp) = create_test_repo();
        let a = ProfileId::new("a");
        let b = ProfileId::new("b");
        let pair = ProfilePair::new(&b, &a).unwrap();

        assert_eq!(repo.find_by_pair(&pair).await.unwrap(), None);
        let (created, _) = repo.get_or_create(&a, &b).await.unwrap();
        assert_eq!(repo.find_by_pair(&pair).await.unwrap(), Some(created.clone()));
        assert_eq!(repo.get(&created.id).await.unwrap(), Some(created));
        assert_eq!(repo.get(&ConversationId::new("nope")).await.unwrap(), None);
    }
}
