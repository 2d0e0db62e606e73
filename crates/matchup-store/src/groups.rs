//! CRUD operations for cached [`Group`] directory entries.
//!
//! The group directory is an external collaborator; this table only caches
//! its answers so membership lookups keep working offline.

use rusqlite::params;
use uuid::Uuid;

use matchup_shared::{Group, GroupId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert or replace one cached group.
    pub fn upsert_group(&self, group: &Group) -> Result<()> {
        let members = serde_json::to_string(&group.members)?;
        self.conn().execute(
            "INSERT INTO groups (id, name, zone, members)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = ?2, zone = ?3, members = ?4",
            params![group.id.to_string(), group.name, group.zone, members],
        )?;
        Ok(())
    }

    /// Fetch a single cached group by id.
    pub fn get_group(&self, id: GroupId) -> Result<Group> {
        self.conn()
            .query_row(
                "SELECT id, name, zone, members FROM groups WHERE id = ?1",
                params![id.to_string()],
                row_to_group,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all cached groups, ordered by name.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name, zone, members FROM groups ORDER BY name ASC")?;

        let rows = stmt.query_map([], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// Ids of every cached group the user belongs to.
    pub fn group_memberships(&self, user: &UserId) -> Result<Vec<GroupId>> {
        Ok(self
            .list_groups()?
            .into_iter()
            .filter(|g| g.has_member(user))
            .map(|g| g.id)
            .collect())
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let zone: String = row.get(2)?;
    let members_json: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let members: Vec<UserId> = serde_json::from_str(&members_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Group {
        id: GroupId(id),
        name,
        zone,
        members,
    })
}
