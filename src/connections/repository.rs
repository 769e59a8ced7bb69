// Repository pattern - isolates connection request side effects
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::sync::Arc;

use crate::connections::domain::{ConnectionRequest, RequestRole, RequestStatus};
use crate::conversations::repository::get_or_create_in;
use crate::conversations::Conversation;
use crate::db::{is_unique_violation, RepositoryError};
use crate::ids::{ProfileId, RequestId};
use crate::state::DbPool;

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Insert a pending request. `Conflict` when the pair already has one,
    /// in either direction.
    async fn create(&self, request: &ConnectionRequest) -> Result<(), RepositoryError>;

    async fn get(&self, id: &RequestId) -> Result<Option<ConnectionRequest>, RepositoryError>;

    /// Newest first.
    async fn list(
        &self,
        profile: &ProfileId,
        role: RequestRole,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError>;

    /// Atomically get-or-create the pair's conversation and delete the
    /// request. `NotFound` if the request is gone or no longer pending.
    async fn accept(
        &self,
        request: &ConnectionRequest,
    ) -> Result<(Conversation, bool), RepositoryError>;

    /// Returns true if a row was deleted.
    async fn delete(&self, id: &RequestId) -> Result<bool, RepositoryError>;
}

pub type DynConnectionRepository = Arc<dyn ConnectionRepository>;

pub struct SqliteConnectionRepository {
    pool: DbPool,
}

impl SqliteConnectionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRequest> {
    let status: String = row.get(3)?;
    let status = RequestStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, "status".into(), rusqlite::types::Type::Text)
    })?;

    Ok(ConnectionRequest {
        id: RequestId::new(row.get::<_, String>(0)?),
        sender: ProfileId::new(row.get::<_, String>(1)?),
        receiver: ProfileId::new(row.get::<_, String>(2)?),
        status,
        created_at: row.get(4)?,
    })
}

const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at";

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    async fn create(&self, request: &ConnectionRequest) -> Result<(), RepositoryError> {
        let pair = request.pair().ok_or_else(|| {
            RepositoryError::Conflict(format!("request {} targets its sender", request.id))
        })?;
        let conn = self.pool.get()?;

        let inserted = conn.execute(
            "INSERT INTO connection_requests
                 (id, sender_id, receiver_id, status, pair_lo, pair_hi, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                request.id.as_str(),
                request.sender.as_str(),
                request.receiver.as_str(),
                request.status.as_str(),
                pair.lo().as_str(),
                pair.hi().as_str(),
                request.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "request between {} and {} already exists",
                pair.lo(),
                pair.hi()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &RequestId) -> Result<Option<ConnectionRequest>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM connection_requests WHERE id = ?1",
            REQUEST_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id.as_str()], request_from_row)
            .optional()?)
    }

    async fn list(
        &self,
        profile: &ProfileId,
        role: RequestRole,
    ) -> Result<Vec<ConnectionRequest>, RepositoryError> {
        let conn = self.pool.get()?;

        let filter = match role {
            RequestRole::Sent => "sender_id = ?1",
            RequestRole::Received => "receiver_id = ?1",
            RequestRole::Any => "(sender_id = ?1 OR receiver_id = ?1)",
        };
        let sql = format!(
            "SELECT {} FROM connection_requests WHERE {}
             ORDER BY created_at DESC, id DESC",
            REQUEST_COLUMNS, filter
        );

        let mut stmt = conn.prepare(&sql)?;
        let requests = stmt
            .query_map(params![profile.as_str()], request_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    async fn accept(
        &self,
        request: &ConnectionRequest,
    ) -> Result<(Conversation, bool), RepositoryError> {
        let mut conn = self.pool.get()?;

        // Dropping the transaction on any error rolls both writes back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = get_or_create_in(&tx, &request.sender, &request.receiver)?;

        let deleted = tx.execute(
            "DELETE FROM connection_requests WHERE id = ?1 AND status = 'pending'",
            params![request.id.as_str()],
        )?;
        if deleted == 0 {
            return Err(RepositoryError::NotFound(request.id.to_string()));
        }

        tx.commit()?;
        Ok(outcome)
    }

    async fn delete(&self, id: &RequestId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM connection_requests WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(rows > 0)
    }
}
