//! Dashboard chart series.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::window::{first_of_month, midnight};
use super::{buckets, DateWindow, Period, ReportResult};
use crate::db::Database;
use crate::models::{PaymentMethod, VisitStatus};

/// Integer percentage of `part` in `total`, truncated; 0 when `total` is 0.
pub fn share(part: Decimal, total: Decimal) -> u32 {
    if total <= Decimal::ZERO {
        return 0;
    }
    (part / total * Decimal::ONE_HUNDRED).trunc().to_u32().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientAttendance {
    pub labels: Vec<String>,
    pub total_patients: Vec<u64>,
    pub new_patients: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodShare {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub share: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: VisitStatus,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySales {
    pub category: String,
    pub amount: Decimal,
    pub share: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub labels: Vec<String>,
    pub current_year: Vec<Decimal>,
    pub previous_year: Vec<Decimal>,
}

/// Visits per bucket, and how many of them were a patient's first visit.
pub(crate) fn patient_attendance(
    db: &Database,
    period: Period,
    window: &DateWindow,
    branch: Option<&str>,
) -> ReportResult<PatientAttendance> {
    let visits = db.visit_facts(window.start, window.end, branch)?;
    let first_visits = db.first_visit_facts(window.start, window.end, branch)?;

    let buckets = buckets(period, window)?;
    let total_patients = tally(&buckets, visits.iter().map(|v| v.created_at));
    let new_patients = tally(&buckets, first_visits.iter().map(|v| v.created_at));

    Ok(PatientAttendance {
        labels: buckets.into_iter().map(|(label, _)| label).collect(),
        total_patients,
        new_patients,
    })
}

/// Count timestamps per bucket. Buckets are contiguous and sorted, so each
/// timestamp is placed with one binary search.
fn tally(buckets: &[(String, DateWindow)], times: impl Iterator<Item = DateTime<Utc>>) -> Vec<u64> {
    let mut counts = vec![0u64; buckets.len()];
    for at in times {
        let idx = buckets.partition_point(|(_, bucket)| bucket.end <= at);
        if let Some((_, bucket)) = buckets.get(idx) {
            if bucket.contains(at) {
                counts[idx] += 1;
            }
        }
    }
    counts
}

/// Amount and share per payment method, every method listed.
pub(crate) fn payment_methods(db: &Database, window: &DateWindow, branch: Option<&str>) -> ReportResult<Vec<MethodShare>> {
    let facts = db.payment_facts(window.start, window.end, branch)?;
    let total: Decimal = facts.iter().map(|f| f.amount).sum();

    Ok(PaymentMethod::ALL
        .iter()
        .map(|method| {
            let amount: Decimal = facts.iter().filter(|f| f.method == *method).map(|f| f.amount).sum();
            MethodShare {
                method: *method,
                amount,
                share: share(amount, total),
            }
        })
        .collect())
}

/// Current visit count per status, every status listed.
pub(crate) fn order_status(db: &Database, branch: Option<&str>) -> ReportResult<Vec<StatusCount>> {
    let counts: BTreeMap<&'static str, u64> = db
        .status_counts(branch)?
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();

    Ok(VisitStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            label: status.label().to_string(),
            count: counts.get(status.as_str()).copied().unwrap_or(0),
        })
        .collect())
}

/// Concept totals per label, largest first.
pub(crate) fn sales_by_category(db: &Database, window: &DateWindow, branch: Option<&str>) -> ReportResult<Vec<CategorySales>> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for (concept, amount) in db.concept_facts(window.start, window.end, branch)? {
        *totals.entry(concept).or_default() += amount;
    }
    let grand_total: Decimal = totals.values().copied().sum();

    let mut sales: Vec<CategorySales> = totals
        .into_iter()
        .map(|(category, amount)| CategorySales {
            share: share(amount, grand_total),
            category,
            amount,
        })
        .collect();
    sales.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    Ok(sales)
}

const MONTH_LABELS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

fn revenue_by_month(db: &Database, year: i32, branch: Option<&str>) -> ReportResult<Vec<Decimal>> {
    let start = midnight(first_of_month(year, 1)?);
    let end = midnight(first_of_month(year + 1, 1)?);

    let mut months = vec![Decimal::ZERO; 12];
    for fact in db.payment_facts(start, end, branch)? {
        months[fact.paid_at.month0() as usize] += fact.amount;
    }
    Ok(months)
}

/// Payment income per month for `year` and the year before.
pub(crate) fn monthly_revenue(db: &Database, year: i32, branch: Option<&str>) -> ReportResult<MonthlyRevenue> {
    Ok(MonthlyRevenue {
        year,
        labels: MONTH_LABELS.iter().map(|m| m.to_string()).collect(),
        current_year: revenue_by_month(db, year, branch)?,
        previous_year: revenue_by_month(db, year - 1, branch)?,
    })
}
