//! Patient directory: registration, lookup and the patient grid.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{
    normalize_name, Actor, LatestVisitSummary, NewPatient, Page, Patient, PatientGridItem,
};

/// Quick search never returns more than this many patients.
pub const SEARCH_LIMIT: usize = 20;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Directory errors.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Patient name is required")]
    MissingName,
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Patient directory service.
pub struct PatientDirectory<'a> {
    db: &'a Database,
}

impl<'a> PatientDirectory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a patient at the actor's branch.
    ///
    /// A patient with the same normalized name and phone already on file is
    /// a conflict.
    pub fn create_patient(&self, actor: &Actor, request: NewPatient) -> DirectoryResult<Patient> {
        if normalize_name(&request.name).is_empty() {
            return Err(DirectoryError::MissingName);
        }
        if !self.db.branch_exists(&actor.branch_id)? {
            return Err(DirectoryError::BranchNotFound(actor.branch_id.clone()));
        }

        let patient = request.into_patient(actor);
        self.db.insert_patient(&patient)?;

        info!(patient_id = %patient.id, branch_id = %patient.branch_id, "Patient registered");
        Ok(patient)
    }

    pub fn get_patient(&self, patient_id: &str) -> DirectoryResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| DirectoryError::PatientNotFound(patient_id.to_string()))
    }

    /// Replace a patient's demographics. Registration data is kept.
    pub fn update_patient(&self, actor: &Actor, patient_id: &str, request: NewPatient) -> DirectoryResult<Patient> {
        if normalize_name(&request.name).is_empty() {
            return Err(DirectoryError::MissingName);
        }
        let existing = self.get_patient(patient_id)?;

        let fresh = request.into_patient(actor);
        let updated = Patient {
            id: existing.id,
            branch_id: existing.branch_id,
            registered_at: existing.registered_at,
            created_by_id: existing.created_by_id,
            created_by_name: existing.created_by_name,
            ..fresh
        };

        if !self.db.update_patient(&updated)? {
            return Err(DirectoryError::PatientNotFound(patient_id.to_string()));
        }
        info!(patient_id, user_id = %actor.user_id, "Patient updated");
        Ok(updated)
    }

    /// Case-insensitive substring match on name or phone. A blank term finds nothing.
    pub fn search_patients(&self, term: &str, branch_id: Option<&str>) -> DirectoryResult<Vec<Patient>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.search_patients(term, branch_id, SEARCH_LIMIT)?)
    }

    /// One page of the patient grid with each patient's latest visit, ordered
    /// by name. `page` is 1-based.
    pub fn query_patients(&self, term: Option<&str>, page: u32, page_size: u32) -> DirectoryResult<Page<PatientGridItem>> {
        let page = page.max(1);
        let page_size = match page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        let offset = u64::from(page - 1) * u64::from(page_size);

        let (patients, total) = self.db.page_patients(term, offset, page_size)?;

        let items = patients
            .into_iter()
            .map(|patient| self.grid_item(patient))
            .collect::<DirectoryResult<Vec<_>>>()?;

        Ok(Page {
            page,
            page_size,
            total,
            items,
        })
    }

    /// The grid row of a single patient.
    pub fn patient_grid_row(&self, patient_id: &str) -> DirectoryResult<PatientGridItem> {
        let patient = self.get_patient(patient_id)?;
        self.grid_item(patient)
    }

    /// An order is pending while the latest visit is at the lab or still owes money.
    fn grid_item(&self, patient: Patient) -> DirectoryResult<PatientGridItem> {
        let last_visit = match self.db.latest_visit_for_patient(&patient.id)? {
            Some(visit) => Some(LatestVisitSummary {
                last_payment: self.db.last_payment(&visit.id)?,
                visit_id: visit.id,
                created_at: visit.created_at,
                status: visit.status,
                total: visit.total,
                paid: visit.paid,
                balance: visit.balance,
            }),
            None => None,
        };
        let has_pending_order = last_visit
            .as_ref()
            .is_some_and(|v| v.status.is_in_lab() || v.balance.is_some_and(|b| b > Decimal::ZERO));

        Ok(PatientGridItem {
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
            branch_id: patient.branch_id,
            registered_at: patient.registered_at,
            last_visit,
            has_pending_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PaymentLedger;
    use crate::models::{Branch, NewPayment, PaymentMethod, Visit};

    fn setup_db() -> (Database, Actor) {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Centro");
        db.insert_branch(&branch).unwrap();
        (db, Actor::new("u1", "Ana", branch.id))
    }

    fn patient(name: &str, phone: &str) -> NewPatient {
        NewPatient {
            name: name.into(),
            age: 34,
            phone: phone.into(),
            occupation: "Teacher".into(),
            address: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);

        let created = directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();
        let fetched = directory.get_patient(&created.id).unwrap();
        assert_eq!(fetched.name, "Jane Doe");
        assert_eq!(fetched.branch_id, actor.branch_id);
        assert_eq!(fetched.created_by_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_blank_name_rejected() {
        let (db, actor) = setup_db();
        let result = PatientDirectory::new(&db).create_patient(&actor, patient("   ", "555"));
        assert!(matches!(result, Err(DirectoryError::MissingName)));
    }

    #[test]
    fn test_unknown_branch_rejected() {
        let (db, _) = setup_db();
        let stranger = Actor::new("u2", "Luis", "nowhere");
        let result = PatientDirectory::new(&db).create_patient(&stranger, patient("Jane Doe", "555"));
        assert!(matches!(result, Err(DirectoryError::BranchNotFound(_))));
    }

    #[test]
    fn test_duplicate_patient_conflict() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);

        directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();
        let result = directory.create_patient(&actor, patient("  jane   doe ", " 555-1111"));
        assert!(matches!(result, Err(DirectoryError::Database(DbError::Conflict(_)))));
    }

    #[test]
    fn test_update_keeps_registration() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        let created = directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();

        let editor = Actor::new("u2", "Luis", actor.branch_id.clone());
        let mut changes = patient("Jane Doe Smith", "555-2222");
        changes.age = 35;
        let updated = directory.update_patient(&editor, &created.id, changes).unwrap();

        assert_eq!(updated.registered_at, created.registered_at);
        assert_eq!(updated.created_by_name.as_deref(), Some("Ana"));
        assert_eq!(directory.get_patient(&created.id).unwrap().age, 35);

        let missing = directory.update_patient(&editor, "nobody", patient("X", "1"));
        assert!(matches!(missing, Err(DirectoryError::PatientNotFound(_))));
    }

    #[test]
    fn test_search() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();
        directory.create_patient(&actor, patient("John Roe", "555-2222")).unwrap();

        assert!(directory.search_patients("  ", None).unwrap().is_empty());
        assert_eq!(directory.search_patients("doe", None).unwrap().len(), 1);
        assert_eq!(directory.search_patients("555", None).unwrap().len(), 2);
        assert_eq!(directory.search_patients("2222", None).unwrap()[0].name, "John Roe");
    }

    #[test]
    fn test_search_capped() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        for i in 0..25 {
            directory
                .create_patient(&actor, patient(&format!("Patient {:02}", i), &format!("555-{:04}", i)))
                .unwrap();
        }
        assert_eq!(directory.search_patients("patient", None).unwrap().len(), SEARCH_LIMIT);
    }

    #[test]
    fn test_query_grid_pending_order() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        let jane = directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();
        directory.create_patient(&actor, patient("John Roe", "555-2222")).unwrap();

        let mut visit = Visit::new(&jane.id, &actor.branch_id, &actor);
        visit.total = Some(Decimal::new(25000, 2));
        db.insert_visit(&visit).unwrap();
        PaymentLedger::new(&db)
            .add_payment(&actor, &visit.id, &NewPayment::new(Decimal::new(10000, 2), PaymentMethod::Cash))
            .unwrap();

        let page = directory.query_patients(None, 1, 0).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);

        let jane_row = page.items.iter().find(|p| p.id == jane.id).unwrap();
        let last = jane_row.last_visit.as_ref().unwrap();
        assert_eq!(last.balance, Some(Decimal::new(15000, 2)));
        assert!(last.last_payment.is_some());
        assert!(jane_row.has_pending_order);

        let john_row = page.items.iter().find(|p| p.id != jane.id).unwrap();
        assert!(john_row.last_visit.is_none());
        assert!(!john_row.has_pending_order);
    }

    #[test]
    fn test_single_grid_row_matches_page_row() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        let jane = directory.create_patient(&actor, patient("Jane Doe", "555-1111")).unwrap();

        let mut visit = Visit::new(&jane.id, &actor.branch_id, &actor);
        visit.total = Some(Decimal::new(25000, 2));
        db.insert_visit(&visit).unwrap();
        PaymentLedger::new(&db)
            .add_payment(&actor, &visit.id, &NewPayment::new(Decimal::new(5000, 2), PaymentMethod::Card))
            .unwrap();

        let row = directory.patient_grid_row(&jane.id).unwrap();
        assert_eq!(row.last_visit.as_ref().unwrap().visit_id, visit.id);
        assert!(row.has_pending_order);

        let page = directory.query_patients(None, 1, 10).unwrap();
        assert_eq!(page.items[0], row);

        let missing = directory.patient_grid_row("nobody");
        assert!(matches!(missing, Err(DirectoryError::PatientNotFound(_))));
    }

    #[test]
    fn test_query_paging() {
        let (db, actor) = setup_db();
        let directory = PatientDirectory::new(&db);
        for i in 0..5 {
            directory
                .create_patient(&actor, patient(&format!("Patient {}", i), &format!("555-{}", i)))
                .unwrap();
        }

        let second = directory.query_patients(Some("patient"), 2, 2).unwrap();
        assert_eq!(second.total, 5);
        assert_eq!(second.items.len(), 2);

        let last = directory.query_patients(Some("patient"), 3, 2).unwrap();
        assert_eq!(last.items.len(), 1);
    }
}
