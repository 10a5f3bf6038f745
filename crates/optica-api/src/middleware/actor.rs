//! Actor extraction middleware.
//!
//! The identity gateway in front of the API authenticates users and forwards
//! who they are in request headers. This layer turns those headers into an
//! [`Actor`] and injects it into request extensions for downstream handlers.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use optica_core::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_NAME_HEADER: &str = "X-User-Name";
pub const BRANCH_ID_HEADER: &str = "X-Branch-Id";
pub const ROLES_HEADER: &str = "X-User-Roles";

/// Require a user and branch on every request.
pub async fn require_actor(mut req: Request<axum::body::Body>, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(actor) => {
            tracing::debug!(user_id = %actor.user_id, branch_id = %actor.branch_id, "Actor resolved");
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build an actor from gateway headers. Roles are comma separated.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER}")))?;
    let branch_id = header(headers, BRANCH_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {BRANCH_ID_HEADER}")))?;
    let name = header(headers, USER_NAME_HEADER).unwrap_or(user_id);

    let mut actor = Actor::new(user_id, name, branch_id);
    if let Some(roles) = header(headers, ROLES_HEADER) {
        actor.roles = roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
    }
    Ok(actor)
}
