//! Read-only dashboard reporting.
//!
//! Reports never write. Non-admin actors only ever see their own branch,
//! whatever filter they ask for.

mod charts;
mod kpis;
mod window;

pub use charts::{share, CategorySales, MethodShare, MonthlyRevenue, PatientAttendance, StatusCount};
pub use kpis::{pct_change, DashboardKpis, Kpi};
pub use window::*;

use thiserror::Error;
use tracing::debug;

use crate::db::{Database, DbError};
use crate::models::Actor;

/// Reporting errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unknown period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Dashboard report service.
pub struct Dashboard<'a> {
    db: &'a Database,
}

impl<'a> Dashboard<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn kpis(&self, actor: &Actor, report: &ResolvedReport) -> ReportResult<DashboardKpis> {
        let windows = &report.windows;
        let branch = report.branch.scoped_to(actor);
        debug!(period = %report.period, branch = ?branch, "Computing dashboard KPIs");
        kpis::compute_kpis(self.db, &windows.current, &windows.previous, branch.as_deref())
    }

    pub fn patient_attendance(&self, actor: &Actor, report: &ResolvedReport) -> ReportResult<PatientAttendance> {
        let branch = report.branch.scoped_to(actor);
        charts::patient_attendance(self.db, report.period, &report.windows.current, branch.as_deref())
    }

    pub fn payment_methods(&self, actor: &Actor, report: &ResolvedReport) -> ReportResult<Vec<MethodShare>> {
        let branch = report.branch.scoped_to(actor);
        charts::payment_methods(self.db, &report.windows.current, branch.as_deref())
    }

    /// Visits per current status. Not windowed.
    pub fn order_status(&self, actor: &Actor, branch: &BranchFilter) -> ReportResult<Vec<StatusCount>> {
        charts::order_status(self.db, branch.scoped_to(actor).as_deref())
    }

    pub fn sales_by_category(&self, actor: &Actor, report: &ResolvedReport) -> ReportResult<Vec<CategorySales>> {
        let branch = report.branch.scoped_to(actor);
        charts::sales_by_category(self.db, &report.windows.current, branch.as_deref())
    }

    /// Monthly income for the reference year against the year before.
    pub fn monthly_revenue(&self, actor: &Actor, report: &ResolvedReport) -> ReportResult<MonthlyRevenue> {
        let branch = report.branch.scoped_to(actor);
        charts::monthly_revenue(self.db, report.year, branch.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PaymentLedger;
    use crate::lifecycle::StatusTracker;
    use crate::models::{
        Branch, ChangeStatusRequest, LabKind, LabRouting, NewConcept, NewPatient, NewPayment, NewVisit,
        PaymentMethod, RowParsePolicy, TransitionPolicy, VisitStatus,
    };
    use crate::intake::VisitIntake;
    use chrono::{Datelike, Utc};
    use rust_decimal::Decimal;

    struct Fixture {
        db: Database,
        clerk: Actor,
        admin: Actor,
        other_branch: String,
    }

    fn setup_db() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let centro = Branch::new("Centro");
        let norte = Branch::new("Norte");
        db.insert_branch(&centro).unwrap();
        db.insert_branch(&norte).unwrap();

        Fixture {
            clerk: Actor::new("u1", "Ana", centro.id.clone()),
            admin: Actor::new("u9", "Root", centro.id.clone()).with_role("admin"),
            other_branch: norte.id,
            db,
        }
    }

    fn open_visit(f: &Fixture, actor: &Actor, name: &str) -> String {
        let patient = NewPatient {
            name: name.into(),
            phone: format!("555-{}", name.len()),
            ..Default::default()
        }
        .into_patient(actor);
        f.db.insert_patient(&patient).unwrap();
        VisitIntake::new(&f.db, RowParsePolicy::Skip)
            .create_visit(
                actor,
                &NewVisit {
                    patient_id: patient.id,
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn today_query(period: Period) -> ResolvedReport {
        ReportQuery {
            period,
            today: Some(Utc::now().date_naive()),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn test_kpis_current_period() {
        let f = setup_db();
        let visit_id = open_visit(&f, &f.clerk, "Jane Doe");
        PaymentLedger::new(&f.db)
            .add_payment(&f.clerk, &visit_id, &NewPayment::new(Decimal::new(10000, 2), PaymentMethod::Cash))
            .unwrap();

        let tracker = StatusTracker::new(&f.db, TransitionPolicy::Strict);
        tracker
            .change_status(&f.clerk, &visit_id, &ChangeStatusRequest::to(VisitStatus::Registered))
            .unwrap();
        let mut to_lab = ChangeStatusRequest::to(VisitStatus::SentToLab);
        to_lab.lab = Some(LabRouting {
            kind: LabKind::External,
            lab_id: None,
            lab_name: Some("Opticlab".into()),
        });
        tracker.change_status(&f.clerk, &visit_id, &to_lab).unwrap();

        let kpis = Dashboard::new(&f.db).kpis(&f.clerk, &today_query(Period::Day)).unwrap();
        assert_eq!(kpis.patients_attended.value, Decimal::ONE);
        assert_eq!(kpis.patients_attended.change, Decimal::ONE_HUNDRED);
        assert_eq!(kpis.new_patients.value, Decimal::ONE);
        assert_eq!(kpis.orders_paid.value, Decimal::ONE);
        assert_eq!(kpis.total_income.value, Decimal::new(10000, 2));
        assert_eq!(kpis.sent_to_lab.value, Decimal::ONE);
        assert_eq!(kpis.delivered_to_customers.value, Decimal::ZERO);
        assert_eq!(kpis.delivered_to_customers.change, Decimal::ZERO);
    }

    #[test]
    fn test_non_admin_scoped_to_own_branch() {
        let f = setup_db();
        let elsewhere = Actor::new("u2", "Luis", f.other_branch.clone());
        open_visit(&f, &f.clerk, "Jane Doe");
        open_visit(&f, &elsewhere, "John Roe");

        let mut query = today_query(Period::Week);
        query.branch = BranchFilter::All;
        let dashboard = Dashboard::new(&f.db);

        let clerk_view = dashboard.kpis(&f.clerk, &query).unwrap();
        assert_eq!(clerk_view.patients_attended.value, Decimal::ONE);

        let admin_view = dashboard.kpis(&f.admin, &query).unwrap();
        assert_eq!(admin_view.patients_attended.value, Decimal::TWO);

        query.branch = BranchFilter::Branch(f.other_branch.clone());
        let admin_filtered = dashboard.kpis(&f.admin, &query).unwrap();
        assert_eq!(admin_filtered.patients_attended.value, Decimal::ONE);
    }

    #[test]
    fn test_payment_methods_and_sales() {
        let f = setup_db();
        let visit_id = open_visit(&f, &f.clerk, "Jane Doe");
        let ledger = PaymentLedger::new(&f.db);
        ledger
            .add_payment(&f.clerk, &visit_id, &NewPayment::new(Decimal::new(7500, 2), PaymentMethod::Cash))
            .unwrap();
        ledger
            .add_payment(&f.clerk, &visit_id, &NewPayment::new(Decimal::new(2500, 2), PaymentMethod::Card))
            .unwrap();

        let intake = VisitIntake::new(&f.db, RowParsePolicy::Skip);
        for (concept, cents) in [("Lenses", 30000), ("Frames", 10000), ("Lenses", 10000)] {
            intake
                .add_concept(
                    &f.clerk,
                    &visit_id,
                    &NewConcept {
                        concept: concept.into(),
                        amount: Decimal::new(cents, 2),
                        notes: None,
                    },
                )
                .unwrap();
        }

        let dashboard = Dashboard::new(&f.db);
        let query = today_query(Period::Month);

        let methods = dashboard.payment_methods(&f.clerk, &query).unwrap();
        assert_eq!(methods.len(), 3);
        assert_eq!(methods[0].method, PaymentMethod::Cash);
        assert_eq!(methods[0].share, 75);
        assert_eq!(methods[1].share, 25);
        assert_eq!(methods[2].amount, Decimal::ZERO);

        let sales = dashboard.sales_by_category(&f.clerk, &query).unwrap();
        assert_eq!(sales[0].category, "Lenses");
        assert_eq!(sales[0].amount, Decimal::new(40000, 2));
        assert_eq!(sales[0].share, 80);
        assert_eq!(sales[1].share, 20);
    }

    #[test]
    fn test_order_status_lists_every_status() {
        let f = setup_db();
        open_visit(&f, &f.clerk, "Jane Doe");
        open_visit(&f, &f.clerk, "John Roe");

        let counts = Dashboard::new(&f.db).order_status(&f.clerk, &BranchFilter::All).unwrap();
        assert_eq!(counts.len(), VisitStatus::ALL.len());
        let created = counts.iter().find(|c| c.status == VisitStatus::Created).unwrap();
        assert_eq!(created.count, 2);
    }

    #[test]
    fn test_attendance_and_revenue_series() {
        let f = setup_db();
        let visit_id = open_visit(&f, &f.clerk, "Jane Doe");
        PaymentLedger::new(&f.db)
            .add_payment(&f.clerk, &visit_id, &NewPayment::new(Decimal::new(5000, 2), PaymentMethod::Transfer))
            .unwrap();

        let dashboard = Dashboard::new(&f.db);
        let attendance = dashboard.patient_attendance(&f.clerk, &today_query(Period::Week)).unwrap();
        assert_eq!(attendance.labels.len(), 7);
        assert_eq!(attendance.total_patients.iter().sum::<u64>(), 1);
        assert_eq!(attendance.new_patients.iter().sum::<u64>(), 1);

        let revenue = dashboard.monthly_revenue(&f.clerk, &today_query(Period::Year)).unwrap();
        assert_eq!(revenue.current_year.len(), 12);
        let month = Utc::now().month0() as usize;
        assert_eq!(revenue.current_year[month], Decimal::new(5000, 2));
        assert!(revenue.previous_year.iter().all(|m| m.is_zero()));
    }
}
