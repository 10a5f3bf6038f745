//! Headline KPIs with period-over-period change.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{DateWindow, ReportResult};
use crate::db::{Database, DbResult};
use crate::models::VisitStatus;

/// Percentage change from `previous` to `current`, rounded to 2 places.
///
/// A rise from zero counts as 100%; zero to zero is 0%.
pub fn pct_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO { Decimal::ONE_HUNDRED } else { Decimal::ZERO };
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub value: Decimal,
    pub previous: Decimal,
    pub change: Decimal,
}

impl Kpi {
    pub fn new(value: Decimal, previous: Decimal) -> Self {
        Self {
            value,
            previous,
            change: pct_change(value, previous),
        }
    }

    fn from_counts(value: u64, previous: u64) -> Self {
        Self::new(Decimal::from(value), Decimal::from(previous))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardKpis {
    pub patients_attended: Kpi,
    pub new_patients: Kpi,
    pub orders_paid: Kpi,
    pub total_income: Kpi,
    pub sent_to_lab: Kpi,
    pub delivered_to_customers: Kpi,
}

fn income(db: &Database, window: &DateWindow, branch: Option<&str>) -> ReportResult<Decimal> {
    Ok(db
        .payment_facts(window.start, window.end, branch)?
        .into_iter()
        .map(|f| f.amount)
        .sum())
}

fn compare<F>(current: &DateWindow, previous: &DateWindow, count: F) -> ReportResult<Kpi>
where
    F: Fn(&DateWindow) -> DbResult<u64>,
{
    Ok(Kpi::from_counts(count(current)?, count(previous)?))
}

pub(crate) fn compute_kpis(
    db: &Database,
    current: &DateWindow,
    previous: &DateWindow,
    branch: Option<&str>,
) -> ReportResult<DashboardKpis> {
    Ok(DashboardKpis {
        patients_attended: compare(current, previous, |w| db.count_visits(w.start, w.end, branch))?,
        new_patients: compare(current, previous, |w| db.count_new_patients(w.start, w.end, branch))?,
        orders_paid: compare(current, previous, |w| db.count_paid_orders(w.start, w.end, branch))?,
        total_income: Kpi::new(income(db, current, branch)?, income(db, previous, branch)?),
        sent_to_lab: compare(current, previous, |w| {
            db.count_status_entries(VisitStatus::SentToLab, w.start, w.end, branch)
        })?,
        delivered_to_customers: compare(current, previous, |w| {
            db.count_status_entries(VisitStatus::DeliveredToCustomer, w.start, w.end, branch)
        })?,
    })
}
