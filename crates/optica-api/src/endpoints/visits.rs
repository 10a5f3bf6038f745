//! Visit endpoints.
//!
//! - `POST /api/visits`: open a visit with its prescription data
//! - `GET /api/visits/:id`: full detail
//! - `GET /api/visits/recent/:patient_id`: a patient's latest visits
//! - `GET /api/visits/in-lab`: lab queue
//! - `PUT /api/visits/:id/notes`
//! - `POST /api/visits/:id/concepts`: add a sale line

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use optica_core::models::{LabQueueItem, VisitSummary};
use optica_core::{Actor, NewConcept, NewVisit, VisitDetail};

use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_RECENT: usize = 5;
pub const DEFAULT_LAB_QUEUE: usize = 50;

#[derive(Debug, Serialize)]
pub struct CreatedVisit {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TakeQuery {
    pub take: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewVisit>,
) -> Result<(StatusCode, Json<CreatedVisit>), ApiError> {
    let id = state.run(move |core| core.create_visit(&actor, &request)).await?;
    Ok((StatusCode::CREATED, Json(CreatedVisit { id })))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<VisitDetail>, ApiError> {
    let visit = state.run(move |core| core.get_visit(&actor, &id)).await?;
    Ok(Json(visit))
}

pub async fn recent(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<String>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<VisitSummary>>, ApiError> {
    let take = query.take.unwrap_or(DEFAULT_RECENT);
    let visits = state
        .run(move |core| core.recent_visits(&actor, &patient_id, take))
        .await?;
    Ok(Json(visits))
}

pub async fn in_lab(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TakeQuery>,
) -> Result<Json<Vec<LabQueueItem>>, ApiError> {
    let take = query.take.unwrap_or(DEFAULT_LAB_QUEUE);
    let queue = state.run(move |core| core.visits_in_lab(&actor, take)).await?;
    Ok(Json(queue))
}

pub async fn update_notes(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<NotesRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |core| core.update_visit_notes(&actor, &id, request.notes))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_concept(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<NewConcept>,
) -> Result<StatusCode, ApiError> {
    state.run(move |core| core.add_concept(&actor, &id, &request)).await?;
    Ok(StatusCode::NO_CONTENT)
}
