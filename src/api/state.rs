//! Application state for the API server

use crate::handler::BatchHandler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to the batch route
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Runs admitted batches
    pub handler: Arc<BatchHandler>,

    /// Root cancellation scope; each batch runs under a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState
    pub fn new(handler: Arc<BatchHandler>, shutdown: CancellationToken) -> Self {
        Self { handler, shutdown }
    }
}
