//! Support desk: staff raise tickets, admins read them.

use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{Actor, NewTicket, SupportTicket};

pub const DEFAULT_TICKET_TAKE: usize = 100;
pub const MAX_TICKET_TAKE: usize = 500;

/// Support desk errors.
#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

pub type SupportResult<T> = Result<T, SupportError>;

pub struct SupportDesk<'a> {
    db: &'a Database,
}

impl<'a> SupportDesk<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Open a ticket on behalf of the actor. Subject and message are required.
    pub fn create_ticket(&self, actor: &Actor, request: NewTicket) -> SupportResult<SupportTicket> {
        if request.subject.trim().is_empty() {
            return Err(SupportError::MissingField("subject"));
        }
        if request.message.trim().is_empty() {
            return Err(SupportError::MissingField("message"));
        }

        let ticket = request.into_ticket(actor);
        self.db.insert_ticket(&ticket)?;

        info!(ticket_id = %ticket.id, user_id = %actor.user_id, subject = %ticket.subject, "Support ticket opened");
        Ok(ticket)
    }

    /// Newest tickets first. `take` of 0 means the default.
    pub fn list_tickets(&self, take: usize) -> SupportResult<Vec<SupportTicket>> {
        let take = match take {
            0 => DEFAULT_TICKET_TAKE,
            n => n.min(MAX_TICKET_TAKE),
        };
        Ok(self.db.list_tickets(take)?)
    }
}
