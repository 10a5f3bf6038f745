//! Shared router state.

use optica_core::{OpticaCore, OpticaResult};

use crate::error::ApiError;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub core: OpticaCore,
}

impl AppState {
    pub fn new(core: OpticaCore) -> Self {
        Self { core }
    }

    /// Run a synchronous core operation off the async runtime.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&OpticaCore) -> OpticaResult<T> + Send + 'static,
    {
        let core = self.core.clone();
        let result = tokio::task::spawn_blocking(move || op(&core)).await?;
        Ok(result?)
    }
}
