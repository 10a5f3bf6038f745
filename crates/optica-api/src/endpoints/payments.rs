//! Payment endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use optica_core::{Actor, NewPayment, Payment};

use crate::error::ApiError;
use crate::state::AppState;

/// A single payment or a batch posted atomically.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PaymentBody {
    Batch(Vec<NewPayment>),
    Single(NewPayment),
}

/// `POST /api/visits/:id/payments`
pub async fn add(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(body): Json<PaymentBody>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |core| match body {
            PaymentBody::Single(payment) => core.add_payment(&actor, &id, &payment),
            PaymentBody::Batch(payments) => core.add_payments(&actor, &id, &payments),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/visits/:id/payments`, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let payments = state.run(move |core| core.list_payments(&actor, &id)).await?;
    Ok(Json(payments))
}
