//! Support ticket database operations.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_stored, Database, DbError, DbResult};
use crate::models::SupportTicket;

impl Database {
    pub fn insert_ticket(&self, ticket: &SupportTicket) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO support_tickets
                (id, user_id, user_name, branch_id, email, subject, message, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                ticket.id,
                ticket.user_id,
                ticket.user_name,
                ticket.branch_id,
                ticket.email,
                ticket.subject,
                ticket.message,
                ticket.status.as_str(),
                ticket.created_at,
            ],
        )?;
        Ok(())
    }

    /// Most recent tickets first.
    pub fn list_tickets(&self, limit: usize) -> DbResult<Vec<SupportTicket>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, user_name, branch_id, email, subject, message, status, created_at
            FROM support_tickets
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], ticket_row)?;
        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row?.try_into()?);
        }
        Ok(tickets)
    }
}

struct TicketRow {
    id: String,
    user_id: String,
    user_name: String,
    branch_id: String,
    email: Option<String>,
    subject: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
}

fn ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        branch_id: row.get(3)?,
        email: row.get(4)?,
        subject: row.get(5)?,
        message: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<TicketRow> for SupportTicket {
    type Error = DbError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(SupportTicket {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            branch_id: row.branch_id,
            email: row.email,
            subject: row.subject,
            message: row.message,
            status: parse_stored(&row.status)?,
            created_at: row.created_at,
        })
    }
}
