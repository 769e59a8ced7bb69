use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::RepositoryError;
use crate::ids::UserId;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &UserId, hours: u64) -> Result<String, RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id.as_str(), token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// The user owning an unexpired session, if any.
pub fn user_for_token(pool: &DbPool, token: &str) -> Result<Option<UserId>, RepositoryError> {
    let conn = pool.get()?;
    let user: Option<String> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user.map(UserId::new))
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<bool, RepositoryError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(rows > 0)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
