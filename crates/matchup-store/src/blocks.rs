//! Cached block-lists, one row per owner.
//!
//! Reads default to an empty list rather than failing: a missing block-list
//! just means nobody is blocked.

use rusqlite::params;

use matchup_shared::UserId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Replace the owner's block-list wholesale.
    pub fn set_block_list(&self, owner: &UserId, blocked: &[UserId]) -> Result<()> {
        let blocked_json = serde_json::to_string(blocked)?;
        self.conn().execute(
            "INSERT INTO block_lists (owner, blocked)
             VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET blocked = ?2",
            params![owner.as_str(), blocked_json],
        )?;
        Ok(())
    }

    /// The owner's blocked identities. Empty when none were ever stored.
    pub fn get_block_list(&self, owner: &UserId) -> Result<Vec<UserId>> {
        let row: Option<String> = self
            .conn()
            .query_row(
                "SELECT blocked FROM block_lists WHERE owner = ?1",
                params![owner.as_str()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match row {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_list_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_block_list(&"alice".into()).unwrap().is_empty());
    }

    #[test]
    fn set_and_replace() {
        let db = Database::open_in_memory().unwrap();
        let owner: UserId = "alice".into();

        db.set_block_list(&owner, &["troll".into()]).unwrap();
        assert_eq!(db.get_block_list(&owner).unwrap(), vec![UserId::new("troll")]);

        db.set_block_list(&owner, &[]).unwrap();
        assert!(db.get_block_list(&owner).unwrap().is_empty());
    }
}
