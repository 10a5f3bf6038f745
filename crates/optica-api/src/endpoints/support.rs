//! Support ticket endpoints.
//!
//! - `POST /api/support`: open a ticket
//! - `GET /api/support?take=`: newest tickets, admin only

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optica_core::models::{NewTicket, SupportTicket};
use optica_core::Actor;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OpenedTicket {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    #[serde(default)]
    pub take: usize,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NewTicket>,
) -> Result<(StatusCode, Json<OpenedTicket>), ApiError> {
    let ticket = state.run(move |core| core.create_ticket(&actor, request)).await?;
    Ok((
        StatusCode::CREATED,
        Json(OpenedTicket {
            id: ticket.id,
            created_at: ticket.created_at,
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TicketQuery>,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    let tickets = state.run(move |core| core.list_tickets(&actor, query.take)).await?;
    Ok(Json(tickets))
}
