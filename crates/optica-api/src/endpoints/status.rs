//! Status endpoints: change, history and chain verification.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use optica_core::models::ChainVerification;
use optica_core::{Actor, ChangeStatusRequest, StatusTransition};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/visits/:id/status`
pub async fn change(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<StatusCode, ApiError> {
    state.run(move |core| core.change_status(&actor, &id, &request)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/visits/:id/status-history`, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StatusTransition>>, ApiError> {
    let history = state.run(move |core| core.status_history(&actor, &id)).await?;
    Ok(Json(history))
}

/// `GET /api/visits/:id/status-chain`
pub async fn verify(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ChainVerification>, ApiError> {
    let verification = state.run(move |core| core.verify_status_chain(&actor, &id)).await?;
    Ok(Json(verification))
}
