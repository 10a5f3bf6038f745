//! Patient models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{new_id, Actor, Payment, VisitStatus};

/// A patient registered at one of the branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Unique identifier
    pub id: String,
    /// Full name
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Contact phone; together with the name it identifies a person
    pub phone: String,
    /// Occupation (free text)
    pub occupation: String,
    /// Postal address
    pub address: Option<String>,
    /// Branch where the patient was registered
    pub branch_id: String,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
    /// User who registered the patient
    pub created_by_id: Option<String>,
    /// Display name of the registering user
    pub created_by_name: Option<String>,
}

/// Patient fields supplied by a caller on create or update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewPatient {
    /// Build a patient registered by `actor` at the actor's branch.
    pub fn into_patient(self, actor: &Actor) -> Patient {
        Patient {
            id: new_id(),
            name: self.name.trim().to_string(),
            age: self.age,
            phone: self.phone.trim().to_string(),
            occupation: self.occupation.trim().to_string(),
            address: self.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            branch_id: actor.branch_id.clone(),
            registered_at: Utc::now(),
            created_by_id: Some(actor.user_id.clone()),
            created_by_name: Some(actor.name.clone()),
        }
    }
}

impl Patient {
    /// Name key used for duplicate detection: trimmed, inner whitespace collapsed, uppercase.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Phone key used for duplicate detection.
    pub fn normalized_phone(&self) -> String {
        normalize_phone(&self.phone)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Condensed view of a patient's most recent visit, shown in the patient grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatestVisitSummary {
    pub visit_id: String,
    pub created_at: DateTime<Utc>,
    pub status: VisitStatus,
    pub total: Option<Decimal>,
    pub paid: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub last_payment: Option<Payment>,
}

/// One row of the paged patient grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientGridItem {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub branch_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_visit: Option<LatestVisitSummary>,
    /// Latest visit is at the lab or still owes money
    pub has_pending_order: bool,
}

/// A page of results with the total match count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_patient() {
        let actor = Actor::new("u1", "Ana", "b1");
        let patient = NewPatient {
            name: "  Jane Doe ".into(),
            age: 34,
            phone: "555-0100".into(),
            occupation: "Teacher".into(),
            address: Some("   ".into()),
        }
        .into_patient(&actor);

        assert_eq!(patient.name, "Jane Doe");
        assert_eq!(patient.branch_id, "b1");
        assert_eq!(patient.created_by_id.as_deref(), Some("u1"));
        assert!(patient.address.is_none());
        assert_eq!(patient.id.len(), 36);
    }

    #[test]
    fn test_normalized_keys() {
        assert_eq!(normalize_name("  jane   DOE "), "JANE DOE");
        assert_eq!(normalize_phone(" 555 0100 "), "5550100");
    }
}
