//! Status history database operations (append-only audit trail).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{parse_stored, Database, DbError, DbResult};
use crate::models::{LabRouting, StatusTransition};

const HISTORY_COLUMNS: &str = r#"
    id, visit_id, seq, from_status, to_status, user_id, user_name, branch_id,
    at, notes, lab_kind, lab_id, lab_name, prev_hash, hash
"#;

impl Database {
    /// Append a status transition record.
    pub fn insert_status_transition(&self, record: &StatusTransition) -> DbResult<()> {
        let lab = record.lab.as_ref();
        self.conn.execute(
            r#"
            INSERT INTO status_history (
                id, visit_id, seq, from_status, to_status, user_id, user_name,
                branch_id, at, notes, lab_kind, lab_id, lab_name, prev_hash, hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                record.id,
                record.visit_id,
                record.seq,
                record.from.as_str(),
                record.to.as_str(),
                record.user_id,
                record.user_name,
                record.branch_id,
                record.at,
                record.notes,
                lab.map(|l| l.kind.as_str()),
                lab.and_then(|l| l.lab_id.clone()),
                lab.and_then(|l| l.lab_name.clone()),
                record.prev_hash,
                record.hash,
            ],
        )?;
        Ok(())
    }

    /// Audit trail of a visit, oldest first.
    pub fn list_status_history(&self, visit_id: &str) -> DbResult<Vec<StatusTransition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM status_history WHERE visit_id = ? ORDER BY seq",
            HISTORY_COLUMNS
        ))?;

        let rows = stmt.query_map([visit_id], history_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Latest entry of a visit's audit trail.
    pub fn last_status_transition(&self, visit_id: &str) -> DbResult<Option<StatusTransition>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM status_history WHERE visit_id = ? ORDER BY seq DESC LIMIT 1",
                    HISTORY_COLUMNS
                ),
                [visit_id],
                history_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }
}

/// Intermediate row struct for database mapping.
struct HistoryRow {
    id: String,
    visit_id: String,
    seq: u32,
    from_status: String,
    to_status: String,
    user_id: String,
    user_name: String,
    branch_id: String,
    at: DateTime<Utc>,
    notes: Option<String>,
    lab_kind: Option<String>,
    lab_id: Option<String>,
    lab_name: Option<String>,
    prev_hash: String,
    hash: String,
}

fn history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        seq: row.get(2)?,
        from_status: row.get(3)?,
        to_status: row.get(4)?,
        user_id: row.get(5)?,
        user_name: row.get(6)?,
        branch_id: row.get(7)?,
        at: row.get(8)?,
        notes: row.get(9)?,
        lab_kind: row.get(10)?,
        lab_id: row.get(11)?,
        lab_name: row.get(12)?,
        prev_hash: row.get(13)?,
        hash: row.get(14)?,
    })
}

impl TryFrom<HistoryRow> for StatusTransition {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let lab = row
            .lab_kind
            .map(|kind| -> DbResult<LabRouting> {
                Ok(LabRouting {
                    kind: parse_stored(&kind)?,
                    lab_id: row.lab_id,
                    lab_name: row.lab_name,
                })
            })
            .transpose()?;

        Ok(StatusTransition {
            id: row.id,
            visit_id: row.visit_id,
            seq: row.seq,
            from: parse_stored(&row.from_status)?,
            to: parse_stored(&row.to_status)?,
            user_id: row.user_id,
            user_name: row.user_name,
            branch_id: row.branch_id,
            at: row.at,
            notes: row.notes,
            lab,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}
