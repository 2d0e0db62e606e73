//! CRUD operations for cached [`Session`] records.
//!
//! Sessions are stored as JSON payloads keyed by id. Writes serialize the
//! current shape; reads always pass through [`crate::repair`], so legacy
//! records on disk keep loading after schema evolutions.

use chrono::Utc;
use rusqlite::params;
use tracing::warn;

use matchup_shared::{Session, SessionId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::repair::repair;

impl Database {
    /// Insert or replace one cached session.
    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        self.conn().execute(
            "INSERT INTO sessions (id, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET payload = ?2, updated_at = ?3",
            params![
                session.id.to_string(),
                payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Mirror a full collection snapshot into the cache.
    pub fn upsert_sessions(&self, sessions: &[Session]) -> Result<()> {
        for session in sessions {
            self.upsert_session(session)?;
        }
        Ok(())
    }

    /// Fetch a single cached session by id.
    pub fn get_session(&self, id: SessionId) -> Result<Session> {
        let payload: String = self
            .conn()
            .query_row(
                "SELECT payload FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        let value: serde_json::Value = serde_json::from_str(&payload)?;
        repair(&value).ok_or(StoreError::NotFound)
    }

    /// List every cached session, newest schedule first.
    ///
    /// Unrepairable payloads are skipped with a warning, never surfaced as
    /// errors; stale cache content must not block the offline view.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn().prepare("SELECT id, payload FROM sessions")?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            Ok((id, payload))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            let parsed = serde_json::from_str::<serde_json::Value>(&payload)
                .ok()
                .as_ref()
                .and_then(repair);
            match parsed {
                Some(session) => sessions.push(session),
                None => warn!(id = %id, "skipping unrepairable cached session"),
            }
        }

        sessions.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(sessions)
    }

    /// Delete a cached session by id.  Returns `true` if a row was deleted.
    /// Callers also drop the session's chat via
    /// [`Database::delete_messages_for_session`].
    pub fn delete_session(&self, id: SessionId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}
