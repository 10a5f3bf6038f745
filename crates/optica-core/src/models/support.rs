//! Support tickets raised by staff.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, Actor};

/// Ticket state. Tickets are opened here and closed outside the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("Unknown ticket status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupportTicket {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub branch_id: String,
    /// Contact address for the reply, if the user left one
    pub email: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// Ticket as submitted by a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewTicket {
    #[serde(default)]
    pub email: Option<String>,
    pub subject: String,
    pub message: String,
}

impl NewTicket {
    /// Stamp the ticket with the submitting actor. Text is trimmed and a blank
    /// email is dropped.
    pub fn into_ticket(self, actor: &Actor) -> SupportTicket {
        SupportTicket {
            id: new_id(),
            user_id: actor.user_id.clone(),
            user_name: actor.name.clone(),
            branch_id: actor.branch_id.clone(),
            email: self.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            status: TicketStatus::Open,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_ticket_trims() {
        let actor = Actor::new("u1", "Ana", "b1");
        let ticket = NewTicket {
            email: Some("  ".into()),
            subject: " Printer jammed ".into(),
            message: "Receipt printer at the front desk".into(),
        }
        .into_ticket(&actor);

        assert_eq!(ticket.subject, "Printer jammed");
        assert_eq!(ticket.email, None);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.user_name, "Ana");
    }
}
