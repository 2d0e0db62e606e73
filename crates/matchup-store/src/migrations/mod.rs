//! Schema migration gate for the local cache.
//!
//! The cache schema is versioned through `PRAGMA user_version`: each
//! migration module bumps it once applied, so reopening an already-current
//! database is a no-op. Opening a database always runs the gate before any
//! CRUD helper touches a table.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Version the newest migration module leaves the schema at.
const CURRENT_VERSION: u32 = 1;

/// Bring an open connection up to [`CURRENT_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::debug!(applied, current = CURRENT_VERSION, "cache schema check");

    if applied < 1 {
        tracing::info!("migrating cache schema to v1");
        v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn reopening_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        drop(Database::open_at(&path).unwrap());

        let db = Database::open_at(&path).unwrap();
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
