use madrasa_common::{Error, Result, Role};
use rusqlite::{OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use crate::database::{Database, now_timestamp};

/// The account behind a login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPrincipal {
    pub user_id: i64,
    pub role: Role,
}

impl Database {
    /// Start a session for `user_id` and return its token.
    pub fn create_session(&self, user_id: i64) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![id, user_id, now],
        )
        .map_err(|e| Error::Database(format!("failed to create session: {e}")))?;

        info!("session created for user {}", user_id);
        Ok(id)
    }

    /// Resolve a token to its user. Sessions of deactivated users resolve
    /// to `None`.
    pub fn resolve_session(&self, token: &str) -> Result<Option<SessionPrincipal>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                "SELECT u.id, u.role FROM sessions s
                 JOIN user u ON u.id = s.user_id
                 WHERE s.id = ?1 AND u.is_active = 1",
                params![token],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to resolve session: {e}")))?;

        let Some((user_id, role)) = row else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now_timestamp(), token],
        )
        .map_err(|e| Error::Database(format!("failed to update session timestamp: {e}")))?;

        Ok(Some(SessionPrincipal {
            user_id,
            role: role.parse()?,
        }))
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])
            .map_err(|e| Error::Database(format!("failed to delete session: {e}")))?;
        Ok(())
    }
}
