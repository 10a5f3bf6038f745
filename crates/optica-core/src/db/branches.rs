//! Branch database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Branch;

impl Database {
    /// Insert a new branch.
    pub fn insert_branch(&self, branch: &Branch) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO branches (id, name, active) VALUES (?1, ?2, ?3)",
            params![branch.id, branch.name, branch.active],
        )?;
        Ok(())
    }

    /// Get a branch by ID.
    pub fn get_branch(&self, id: &str) -> DbResult<Option<Branch>> {
        self.conn
            .query_row(
                "SELECT id, name, active FROM branches WHERE id = ?",
                [id],
                |row| {
                    Ok(Branch {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn branch_exists(&self, id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM branches WHERE id = ?",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List all branches ordered by name.
    pub fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active FROM branches ORDER BY name")?;

        let branches = stmt
            .query_map([], |row| {
                Ok(Branch {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    active: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(branches)
    }
}
