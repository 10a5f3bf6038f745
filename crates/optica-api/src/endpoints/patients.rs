//! Patient endpoints.
//!
//! - `POST /api/patients`: register
//! - `GET /api/patients/search`: quick search by name or phone
//! - `GET /api/patients/query`: paged grid with each patient's latest visit
//! - `GET /api/patients/:id` and `PUT /api/patients/:id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use optica_core::models::{Page, PatientGridItem};
use optica_core::{Actor, BranchFilter, NewPatient, Patient};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub term: String,
    #[serde(default, alias = "branchId")]
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub term: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default, alias = "pageSize")]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state.run(move |core| core.create_patient(&actor, request)).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state.run(move |core| core.get_patient(&actor, &id)).await?;
    Ok(Json(patient))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<NewPatient>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .run(move |core| core.update_patient(&actor, &id, request))
        .await?;
    Ok(Json(patient))
}

pub async fn search(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let branch = BranchFilter::parse(query.branch_id.as_deref());
    let patients = state
        .run(move |core| core.search_patients(&actor, &query.term, &branch))
        .await?;
    Ok(Json(patients))
}

pub async fn grid(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<GridQuery>,
) -> Result<Json<Page<PatientGridItem>>, ApiError> {
    let page = state
        .run(move |core| core.query_patients(&actor, query.term.as_deref(), query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

/// `GET /api/patients/:id/grid`: the grid row of one patient.
pub async fn grid_row(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<PatientGridItem>, ApiError> {
    let row = state.run(move |core| core.patient_grid_row(&actor, &id)).await?;
    Ok(Json(row))
}
