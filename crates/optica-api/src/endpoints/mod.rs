//! HTTP endpoint handlers, one module per resource.

pub mod catalog;
pub mod dashboard;
pub mod health;
pub mod patients;
pub mod payments;
pub mod status;
pub mod support;
pub mod visits;
