//! Visit status lifecycle: transition rules, tracker, and tamper-evident audit trail.

mod chain;
mod tracker;
mod transitions;

pub use chain::*;
pub use tracker::*;
pub use transitions::*;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::DbError;
use crate::ledger::LedgerError;
use crate::models::VisitStatus;

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Unknown status: {0}")]
    InvalidStatus(String),

    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition { from: VisitStatus, to: VisitStatus },

    #[error("Lab routing is required when sending to the lab")]
    MissingLabRouting,

    #[error("Order total cannot be negative: {0}")]
    NegativeTotal(Decimal),

    #[error("Total and payments can only be posted when sending to the lab, not on a move to {0}")]
    LabOnlyFields(VisitStatus),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
