//! Optica Core Library
//!
//! Patient records, prescriptions, order lifecycle and payments for a chain of
//! optical shops.
//!
//! # Architecture
//!
//! ```text
//!  Patient ──► Visit (Created) ──► Registered ──► ... ──► SentToLab ──► ... ──► DeliveredToCustomer
//!                │                                          │
//!                │ acuity, refraction,                      │ total + batched payments
//!                │ materials, frames, lenses                │
//!                ▼                                          ▼
//!         [visit collections]                     [payments (append-only)]
//!                                                           │
//!          every status change ──► status_history           ▼
//!          (hash-chained, append-only)          paid / balance recomputed
//!                                                 under the visit version
//! ```
//!
//! # Core Principle
//!
//! **Balances are derived, never edited.** `paid` is always the sum of the
//! payment rows and `balance = total - paid`, rewritten in the same immediate
//! transaction that appends a payment.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 product search
//! - [`models`]: Domain types (Patient, Visit, Payment, StatusTransition, etc.)
//! - [`lifecycle`]: Status tracker, transition table and audit hash chain
//! - [`ledger`]: Per-visit payment ledger
//! - [`intake`]: Visit creation and prescription assembly
//! - [`directory`]: Patient registration, search and grid
//! - [`reporting`]: Dashboard KPIs and charts
//! - [`support`]: Staff support tickets

pub mod db;
pub mod directory;
pub mod intake;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod reporting;
pub mod support;

// Re-export commonly used types
pub use db::Database;
pub use models::{
    Actor, ChangeStatusRequest, NewConcept, NewPatient, NewPayment, NewVisit, Patient, Payment,
    RowParsePolicy, StatusTransition, TransitionPolicy, Visit, VisitDetail, VisitStatus,
};
pub use reporting::{BranchFilter, Period, ReportQuery};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use directory::{DirectoryError, PatientDirectory};
use intake::{IntakeError, VisitIntake};
use ledger::{LedgerError, PaymentLedger};
use lifecycle::{LifecycleError, StatusTracker};
use models::{
    Branch, ChainVerification, LabQueueItem, LedgerTotals, Material, NewTicket, Page, PatientGridItem,
    Product, SupportTicket, VisitConcept, VisitSummary,
};
use reporting::{
    CategorySales, Dashboard, DashboardKpis, MethodShare, MonthlyRevenue, PatientAttendance,
    ReportError, StatusCount,
};
use support::{SupportDesk, SupportError};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum OpticaError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type OpticaResult<T> = Result<T, OpticaError>;

impl From<db::DbError> for OpticaError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(msg) => OpticaError::NotFound(msg),
            db::DbError::Conflict(msg) => OpticaError::Conflict(msg),
            db::DbError::Constraint(msg) => OpticaError::ValidationFailed(msg),
            other => OpticaError::Database(other.to_string()),
        }
    }
}

impl From<LedgerError> for OpticaError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(inner) => inner.into(),
            LedgerError::VisitNotFound(_) => OpticaError::NotFound(e.to_string()),
            LedgerError::NonPositiveAmount(_) | LedgerError::TooPrecise(_) | LedgerError::InvalidMethod(_) => {
                OpticaError::ValidationFailed(e.to_string())
            }
        }
    }
}

impl From<LifecycleError> for OpticaError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Database(inner) => inner.into(),
            LifecycleError::Ledger(inner) => inner.into(),
            LifecycleError::Json(inner) => OpticaError::Database(inner.to_string()),
            LifecycleError::VisitNotFound(_) => OpticaError::NotFound(e.to_string()),
            LifecycleError::InvalidStatus(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::MissingLabRouting
            | LifecycleError::NegativeTotal(_)
            | LifecycleError::LabOnlyFields(_) => OpticaError::ValidationFailed(e.to_string()),
        }
    }
}

impl From<IntakeError> for OpticaError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::Database(inner) => inner.into(),
            IntakeError::PatientNotFound(_)
            | IntakeError::BranchNotFound(_)
            | IntakeError::VisitNotFound(_)
            | IntakeError::MaterialNotFound(_)
            | IntakeError::FrameNotFound(_) => OpticaError::NotFound(e.to_string()),
            IntakeError::InvalidRow(_) | IntakeError::MissingField(_) | IntakeError::NegativeAmount(_) => {
                OpticaError::ValidationFailed(e.to_string())
            }
        }
    }
}

impl From<DirectoryError> for OpticaError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Database(inner) => inner.into(),
            DirectoryError::PatientNotFound(_) | DirectoryError::BranchNotFound(_) => {
                OpticaError::NotFound(e.to_string())
            }
            DirectoryError::MissingName => OpticaError::ValidationFailed(e.to_string()),
        }
    }
}

impl From<ReportError> for OpticaError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Database(inner) => inner.into(),
            ReportError::InvalidPeriod(_) | ReportError::InvalidRange(_) => {
                OpticaError::ValidationFailed(e.to_string())
            }
        }
    }
}

impl From<SupportError> for OpticaError {
    fn from(e: SupportError) -> Self {
        match e {
            SupportError::Database(inner) => inner.into(),
            SupportError::MissingField(_) => OpticaError::ValidationFailed(e.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for OpticaError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        OpticaError::Database(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Policy
// =========================================================================

/// Behaviour switches chosen at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorePolicy {
    #[serde(default)]
    pub transitions: TransitionPolicy,
    #[serde(default)]
    pub row_parse: RowParsePolicy,
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe handle over the database and every service.
#[derive(Clone)]
pub struct OpticaCore {
    db: Arc<Mutex<Database>>,
    policy: CorePolicy,
}

impl OpticaCore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, policy: CorePolicy) -> OpticaResult<Self> {
        let db = Database::open(path)?;
        Ok(Self::with_database(db, policy))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory(policy: CorePolicy) -> OpticaResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(db, policy))
    }

    pub fn with_database(db: Database, policy: CorePolicy) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            policy,
        }
    }

    pub fn policy(&self) -> CorePolicy {
        self.policy
    }

    fn lock(&self) -> OpticaResult<MutexGuard<'_, Database>> {
        Ok(self.db.lock()?)
    }

    fn authorize(actor: &Actor) -> OpticaResult<()> {
        if actor.is_identified() {
            Ok(())
        } else {
            Err(OpticaError::Unauthorized("user and branch are required".into()))
        }
    }

    fn authorize_admin(actor: &Actor) -> OpticaResult<()> {
        Self::authorize(actor)?;
        if actor.is_admin() {
            Ok(())
        } else {
            Err(OpticaError::Unauthorized(format!("{} is not an administrator", actor.user_id)))
        }
    }

    /// Check that the database answers.
    pub fn ping(&self) -> OpticaResult<()> {
        let db = self.lock()?;
        db.list_branches()?;
        Ok(())
    }

    // =========================================================================
    // Branch & Catalog Operations
    // =========================================================================

    pub fn create_branch(&self, actor: &Actor, name: &str) -> OpticaResult<Branch> {
        Self::authorize_admin(actor)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(OpticaError::ValidationFailed("branch name is required".into()));
        }
        let db = self.lock()?;
        let branch = Branch::new(name);
        db.insert_branch(&branch)?;
        Ok(branch)
    }

    pub fn list_branches(&self) -> OpticaResult<Vec<Branch>> {
        let db = self.lock()?;
        Ok(db.list_branches()?)
    }

    /// Add or update a lens material.
    pub fn upsert_material(&self, actor: &Actor, material: &Material) -> OpticaResult<()> {
        Self::authorize_admin(actor)?;
        let db = self.lock()?;
        db.upsert_material(material)?;
        Ok(())
    }

    pub fn list_materials(&self) -> OpticaResult<Vec<Material>> {
        let db = self.lock()?;
        Ok(db.list_materials(true)?)
    }

    /// Add or update a product.
    pub fn upsert_product(&self, actor: &Actor, product: &Product) -> OpticaResult<()> {
        Self::authorize_admin(actor)?;
        let db = self.lock()?;
        db.upsert_product(product)?;
        Ok(())
    }

    /// Withdraw a product from sale. Frames already on visits keep referencing it.
    pub fn deactivate_product(&self, actor: &Actor, product_id: &str) -> OpticaResult<()> {
        Self::authorize_admin(actor)?;
        let db = self.lock()?;
        if !db.deactivate_product(product_id)? {
            return Err(OpticaError::NotFound(format!("Product not found: {}", product_id)));
        }
        Ok(())
    }

    /// A product by id, withdrawn ones included.
    pub fn get_product(&self, product_id: &str) -> OpticaResult<Product> {
        let db = self.lock()?;
        db.get_product(product_id)?
            .ok_or_else(|| OpticaError::NotFound(format!("Product not found: {}", product_id)))
    }

    /// Active products, optionally filtered by category or full-text query.
    pub fn list_products(&self, category: Option<&str>, query: Option<&str>, limit: usize) -> OpticaResult<Vec<Product>> {
        let db = self.lock()?;
        let products = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => db.search_products(q, category, limit)?,
            None => db.list_products(category, true)?.into_iter().take(limit).collect(),
        };
        Ok(products)
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn create_patient(&self, actor: &Actor, request: NewPatient) -> OpticaResult<Patient> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).create_patient(actor, request)?)
    }

    pub fn get_patient(&self, actor: &Actor, patient_id: &str) -> OpticaResult<Patient> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).get_patient(patient_id)?)
    }

    pub fn update_patient(&self, actor: &Actor, patient_id: &str, request: NewPatient) -> OpticaResult<Patient> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).update_patient(actor, patient_id, request)?)
    }

    /// Quick search by name or phone, at most 20 results.
    pub fn search_patients(&self, actor: &Actor, term: &str, branch: &BranchFilter) -> OpticaResult<Vec<Patient>> {
        Self::authorize(actor)?;
        let branch_id = match branch {
            BranchFilter::All => None,
            BranchFilter::Branch(id) => Some(id.as_str()),
        };
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).search_patients(term, branch_id)?)
    }

    pub fn query_patients(
        &self,
        actor: &Actor,
        term: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> OpticaResult<Page<PatientGridItem>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).query_patients(term, page, page_size)?)
    }

    pub fn patient_grid_row(&self, actor: &Actor, patient_id: &str) -> OpticaResult<PatientGridItem> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PatientDirectory::new(&db).patient_grid_row(patient_id)?)
    }

    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Open a visit; returns its ID.
    pub fn create_visit(&self, actor: &Actor, request: &NewVisit) -> OpticaResult<String> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).create_visit(actor, request)?)
    }

    pub fn get_visit(&self, actor: &Actor, visit_id: &str) -> OpticaResult<VisitDetail> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).get_visit(visit_id)?)
    }

    pub fn recent_visits(&self, actor: &Actor, patient_id: &str, take: usize) -> OpticaResult<Vec<VisitSummary>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).recent_visits(patient_id, take)?)
    }

    pub fn visits_in_lab(&self, actor: &Actor, take: usize) -> OpticaResult<Vec<LabQueueItem>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).visits_in_lab(take)?)
    }

    pub fn update_visit_notes(&self, actor: &Actor, visit_id: &str, notes: Option<String>) -> OpticaResult<()> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).update_visit_notes(actor, visit_id, notes)?)
    }

    pub fn add_concept(&self, actor: &Actor, visit_id: &str, request: &NewConcept) -> OpticaResult<VisitConcept> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(VisitIntake::new(&db, self.policy.row_parse).add_concept(actor, visit_id, request)?)
    }

    // =========================================================================
    // Status Operations
    // =========================================================================

    pub fn change_status(
        &self,
        actor: &Actor,
        visit_id: &str,
        request: &ChangeStatusRequest,
    ) -> OpticaResult<StatusTransition> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(StatusTracker::new(&db, self.policy.transitions).change_status(actor, visit_id, request)?)
    }

    pub fn status_history(&self, actor: &Actor, visit_id: &str) -> OpticaResult<Vec<StatusTransition>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(StatusTracker::new(&db, self.policy.transitions).history(visit_id)?)
    }

    pub fn verify_status_chain(&self, actor: &Actor, visit_id: &str) -> OpticaResult<ChainVerification> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(StatusTracker::new(&db, self.policy.transitions).verify(visit_id)?)
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    pub fn add_payment(&self, actor: &Actor, visit_id: &str, payment: &NewPayment) -> OpticaResult<LedgerTotals> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PaymentLedger::new(&db).add_payment(actor, visit_id, payment)?)
    }

    pub fn add_payments(&self, actor: &Actor, visit_id: &str, payments: &[NewPayment]) -> OpticaResult<LedgerTotals> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PaymentLedger::new(&db).add_payments(actor, visit_id, payments)?)
    }

    pub fn list_payments(&self, actor: &Actor, visit_id: &str) -> OpticaResult<Vec<Payment>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(PaymentLedger::new(&db).list_payments(visit_id)?)
    }

    // =========================================================================
    // Support
    // =========================================================================

    pub fn create_ticket(&self, actor: &Actor, request: NewTicket) -> OpticaResult<SupportTicket> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(SupportDesk::new(&db).create_ticket(actor, request)?)
    }

    /// Admin only.
    pub fn list_tickets(&self, actor: &Actor, take: usize) -> OpticaResult<Vec<SupportTicket>> {
        Self::authorize_admin(actor)?;
        let db = self.lock()?;
        Ok(SupportDesk::new(&db).list_tickets(take)?)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    pub fn dashboard_kpis(&self, actor: &Actor, query: &ReportQuery) -> OpticaResult<DashboardKpis> {
        Self::authorize(actor)?;
        let report = query.resolve()?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).kpis(actor, &report)?)
    }

    pub fn patient_attendance(&self, actor: &Actor, query: &ReportQuery) -> OpticaResult<PatientAttendance> {
        Self::authorize(actor)?;
        let report = query.resolve()?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).patient_attendance(actor, &report)?)
    }

    pub fn payment_methods(&self, actor: &Actor, query: &ReportQuery) -> OpticaResult<Vec<MethodShare>> {
        Self::authorize(actor)?;
        let report = query.resolve()?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).payment_methods(actor, &report)?)
    }

    pub fn order_status(&self, actor: &Actor, branch: &BranchFilter) -> OpticaResult<Vec<StatusCount>> {
        Self::authorize(actor)?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).order_status(actor, branch)?)
    }

    pub fn sales_by_category(&self, actor: &Actor, query: &ReportQuery) -> OpticaResult<Vec<CategorySales>> {
        Self::authorize(actor)?;
        let report = query.resolve()?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).sales_by_category(actor, &report)?)
    }

    pub fn monthly_revenue(&self, actor: &Actor, query: &ReportQuery) -> OpticaResult<MonthlyRevenue> {
        Self::authorize(actor)?;
        let report = query.resolve()?;
        let db = self.lock()?;
        Ok(Dashboard::new(&db).monthly_revenue(actor, &report)?)
    }
}
