//! Visit intake: opening a visit with its prescription, and reading it back.

mod prescription;

pub use prescription::*;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::models::{
    new_id, Actor, LabQueueItem, LedgerTotals, NewConcept, NewVisit, RowParsePolicy, Visit,
    VisitConcept, VisitDetail, VisitStatus, VisitSummary,
};

/// Intake errors.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    #[error("Frame not found: {0}")]
    FrameNotFound(String),

    #[error("Invalid prescription row: {0}")]
    InvalidRow(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Concept amount cannot be negative: {0}")]
    NegativeAmount(Decimal),
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Visit intake service.
pub struct VisitIntake<'a> {
    db: &'a Database,
    row_policy: RowParsePolicy,
}

impl<'a> VisitIntake<'a> {
    pub fn new(db: &'a Database, row_policy: RowParsePolicy) -> Self {
        Self { db, row_policy }
    }

    /// Open a visit in `Created` status with every submitted collection.
    ///
    /// The header and all rows are written in one transaction. Returns the
    /// new visit ID.
    pub fn create_visit(&self, actor: &Actor, request: &NewVisit) -> IntakeResult<String> {
        let patient_id = request.patient_id.trim();
        if patient_id.is_empty() {
            return Err(IntakeError::MissingField("patient_id"));
        }

        let acuity = parse_acuity(&request.acuity, self.row_policy)?;
        let refraction = parse_refraction(&request.refraction, self.row_policy)?;
        let lenses = parse_contact_lenses(&request.contact_lenses);

        let branch_id = request
            .branch_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(actor.branch_id.as_str());

        let tx = self.db.write_transaction()?;

        if !self.db.patient_exists(patient_id)? {
            return Err(IntakeError::PatientNotFound(patient_id.to_string()));
        }
        if !self.db.branch_exists(branch_id)? {
            return Err(IntakeError::BranchNotFound(branch_id.to_string()));
        }
        for material in &request.materials {
            if self.db.get_material(&material.material_id)?.is_none() {
                return Err(IntakeError::MaterialNotFound(material.material_id.clone()));
            }
        }
        for frame in &request.frames {
            if self.db.get_product(&frame.product_id)?.is_none() {
                return Err(IntakeError::FrameNotFound(frame.product_id.clone()));
            }
        }

        let mut visit = Visit::new(patient_id, branch_id, actor);
        visit.notes = request.notes.clone().filter(|n| !n.trim().is_empty());
        self.db.insert_visit(&visit)?;

        for row in &acuity {
            self.db.insert_acuity(&visit.id, row)?;
        }
        for row in &refraction {
            self.db.insert_refraction(&visit.id, row)?;
        }
        for material in &request.materials {
            self.db
                .insert_material_selection(&visit.id, &material.material_id, material.notes.as_deref())?;
        }
        for frame in &request.frames {
            self.db
                .insert_frame_selection(&visit.id, &frame.product_id, frame.notes.as_deref())?;
        }
        for lens in &lenses {
            self.db.insert_contact_lens(&visit.id, lens)?;
        }

        tx.commit().map_err(DbError::from)?;

        info!(
            visit_id = %visit.id,
            patient_id,
            branch_id,
            user_id = %actor.user_id,
            acuity = acuity.len(),
            refraction = refraction.len(),
            "Visit created"
        );
        Ok(visit.id)
    }

    /// Full visit detail with every owned collection.
    pub fn get_visit(&self, visit_id: &str) -> IntakeResult<VisitDetail> {
        let visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| IntakeError::VisitNotFound(visit_id.to_string()))?;
        let patient = self
            .db
            .get_patient(&visit.patient_id)?
            .ok_or_else(|| IntakeError::PatientNotFound(visit.patient_id.clone()))?;

        Ok(VisitDetail {
            patient_name: patient.name,
            patient_phone: patient.phone,
            acuity: self.db.list_acuity(visit_id)?,
            refraction: self.db.list_refraction(visit_id)?,
            materials: self.db.list_material_selections(visit_id)?,
            frames: self.db.list_frame_selections(visit_id)?,
            contact_lenses: self.db.list_contact_lenses(visit_id)?,
            payments: self.db.list_payments(visit_id)?,
            concepts: self.db.list_concepts(visit_id)?,
            visit,
        })
    }

    /// A patient's latest visits, newest first, with totals derived from the ledger.
    pub fn recent_visits(&self, patient_id: &str, take: usize) -> IntakeResult<Vec<VisitSummary>> {
        if !self.db.patient_exists(patient_id)? {
            return Err(IntakeError::PatientNotFound(patient_id.to_string()));
        }

        self.db
            .list_patient_visits(patient_id, take)?
            .into_iter()
            .map(|visit| -> IntakeResult<VisitSummary> {
                let totals = LedgerTotals::compute(visit.total, self.db.payment_amounts(&visit.id)?);
                Ok(VisitSummary {
                    last_payment: self.db.last_payment(&visit.id)?,
                    refraction: self.db.list_refraction(&visit.id)?,
                    id: visit.id,
                    created_at: visit.created_at,
                    status: visit.status,
                    total: visit.total,
                    paid: totals.paid,
                    balance: Some(totals.balance),
                })
            })
            .collect()
    }

    /// Visits currently at the lab, latest shipment first.
    pub fn visits_in_lab(&self, take: usize) -> IntakeResult<Vec<LabQueueItem>> {
        Ok(self.db.list_lab_queue(VisitStatus::SentToLab, take)?)
    }

    /// Replace a visit's free-text notes.
    pub fn update_visit_notes(&self, actor: &Actor, visit_id: &str, notes: Option<String>) -> IntakeResult<()> {
        let tx = self.db.write_transaction()?;

        let mut visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| IntakeError::VisitNotFound(visit_id.to_string()))?;
        visit.notes = notes.filter(|n| !n.trim().is_empty());
        self.db.save_visit_state(&visit)?;

        tx.commit().map_err(DbError::from)?;

        info!(visit_id, user_id = %actor.user_id, "Visit notes updated");
        Ok(())
    }

    /// Append a sales line item to a visit.
    pub fn add_concept(&self, actor: &Actor, visit_id: &str, request: &NewConcept) -> IntakeResult<VisitConcept> {
        let concept = request.concept.trim();
        if concept.is_empty() {
            return Err(IntakeError::MissingField("concept"));
        }
        if request.amount < Decimal::ZERO {
            return Err(IntakeError::NegativeAmount(request.amount));
        }
        if self.db.get_visit(visit_id)?.is_none() {
            return Err(IntakeError::VisitNotFound(visit_id.to_string()));
        }

        let record = VisitConcept {
            id: new_id(),
            visit_id: visit_id.to_string(),
            concept: concept.to_string(),
            amount: request.amount,
            user_id: actor.user_id.clone(),
            user_name: actor.name.clone(),
            branch_id: actor.branch_id.clone(),
            created_at: Utc::now(),
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
        };
        self.db.insert_concept(&record)?;

        info!(visit_id, concept, amount = %record.amount, "Concept added");
        Ok(record)
    }
}
