//! Domain models for the optica system.

mod actor;
mod catalog;
mod patient;
mod payment;
mod status;
mod support;
mod visit;

pub use actor::*;
pub use catalog::*;
pub use patient::*;
pub use payment::*;
pub use status::*;
pub use support::*;
pub use visit::*;

/// Fold an enum token for permissive matching: lowercase, separators removed.
///
/// `"SentToLab"`, `"sent_to_lab"` and `"sent-to-lab"` all fold to `"senttolab"`.
pub(crate) fn fold_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Generate a fresh record identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
