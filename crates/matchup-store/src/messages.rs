//! CRUD operations for session chat [`Message`] records. Append-only:
//! messages are never edited, and disappear only when their session is
//! deleted.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use matchup_shared::{Message, MessageId, SessionId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Append one chat message. Duplicate ids are rejected by the primary
    /// key; callers treat that as an already-cached echo.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, session_id, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.session_id.to_string(),
                message.author.as_str(),
                message.body,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List a session's messages in chronological order.
    pub fn list_messages_for_session(&self, session_id: SessionId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, session_id, author, body, created_at
             FROM messages
             WHERE session_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![session_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Delete all messages of a session.  Returns the number of rows removed.
    /// Used when a session is cancelled (the only way chat ever disappears).
    pub fn delete_messages_for_session(&self, session_id: SessionId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE session_id = ?1",
            params![session_id.to_string()],
        )?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let session_id_str: String = row.get(1)?;
    let author: String = row.get(2)?;
    let body: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let session_id = Uuid::parse_str(&session_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: MessageId(id),
        session_id: SessionId(session_id),
        author: UserId::new(author),
        body,
        created_at,
    })
}
