//! Dashboard endpoints.
//!
//! Every report takes `period` (day, week, month, year, custom), an optional
//! `branchId` and, for custom periods, inclusive `startDate` / `endDate`.
//! Non-admin callers always get their own branch.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;

use optica_core::reporting::{
    CategorySales, DashboardKpis, MethodShare, MonthlyRevenue, PatientAttendance, StatusCount,
};
use optica_core::{Actor, BranchFilter, OpticaError, Period, ReportQuery};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub period: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(alias = "branchId")]
    pub branch_id: Option<String>,
    /// Reference date override, mostly for reproducible reports
    pub today: Option<NaiveDate>,
}

impl DashboardParams {
    pub fn into_query(self) -> Result<ReportQuery, ApiError> {
        let period = match self.period.as_deref().map(str::trim) {
            None | Some("") => Period::default(),
            Some(raw) => raw.parse::<Period>().map_err(OpticaError::from)?,
        };
        Ok(ReportQuery {
            period,
            start_date: self.start_date,
            end_date: self.end_date,
            branch: BranchFilter::parse(self.branch_id.as_deref()),
            today: self.today,
        })
    }
}

pub async fn kpis(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardKpis>, ApiError> {
    let query = params.into_query()?;
    let kpis = state.run(move |core| core.dashboard_kpis(&actor, &query)).await?;
    Ok(Json(kpis))
}

pub async fn patient_attendance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<PatientAttendance>, ApiError> {
    let query = params.into_query()?;
    let series = state.run(move |core| core.patient_attendance(&actor, &query)).await?;
    Ok(Json(series))
}

pub async fn payment_methods(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Vec<MethodShare>>, ApiError> {
    let query = params.into_query()?;
    let shares = state.run(move |core| core.payment_methods(&actor, &query)).await?;
    Ok(Json(shares))
}

/// Current status counts; the period is ignored.
pub async fn order_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Vec<StatusCount>>, ApiError> {
    let branch = BranchFilter::parse(params.branch_id.as_deref());
    let counts = state.run(move |core| core.order_status(&actor, &branch)).await?;
    Ok(Json(counts))
}

pub async fn sales_by_category(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Vec<CategorySales>>, ApiError> {
    let query = params.into_query()?;
    let sales = state.run(move |core| core.sales_by_category(&actor, &query)).await?;
    Ok(Json(sales))
}

pub async fn monthly_revenue(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<MonthlyRevenue>, ApiError> {
    let query = params.into_query()?;
    let revenue = state.run(move |core| core.monthly_revenue(&actor, &query)).await?;
    Ok(Json(revenue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_week_for_all_branches() {
        let query = DashboardParams::default().into_query().unwrap();
        assert_eq!(query.period, Period::Week);
        assert_eq!(query.branch, BranchFilter::All);
    }

    #[test]
    fn custom_range_and_branch() {
        let params = DashboardParams {
            period: Some("Custom".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 10),
            branch_id: Some("b2".into()),
            today: None,
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.period, Period::Custom);
        assert_eq!(query.branch, BranchFilter::Branch("b2".into()));
        assert_eq!(query.end_date, NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn unknown_period_is_bad_request() {
        let params = DashboardParams {
            period: Some("fortnight".into()),
            ..Default::default()
        };
        assert!(matches!(params.into_query(), Err(ApiError::BadRequest(_))));
    }
}
