//! Optica HTTP API
//!
//! Axum front end over [`optica_core::OpticaCore`]. Handlers build the
//! acting user from gateway headers and run core operations on the blocking
//! pool.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod state;

pub use config::{load_config, AppConfig};
pub use error::ApiError;
pub use router::api_router;
pub use state::AppState;

use optica_core::{OpticaCore, OpticaResult};

pub const IN_MEMORY_DB: &str = ":memory:";

/// Open the core described by the configuration.
pub fn open_core(config: &AppConfig) -> OpticaResult<OpticaCore> {
    if config.database.path == IN_MEMORY_DB {
        OpticaCore::open_in_memory(config.policy)
    } else {
        OpticaCore::open(&config.database.path, config.policy)
    }
}
