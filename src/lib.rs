//! # batch-fetch
//!
//! HTTP endpoint that takes a batch of URLs, fetches all of them concurrently and
//! reports the body size of each.
//!
//! ## Protocol
//!
//! - `POST` a body with one absolute URL per line
//! - every distinct URL is fetched once, concurrently, under a per-URL deadline
//! - the response body lists one size per URL (`-1` for a failed fetch), order unspecified
//! - `200` when every fetch succeeded, `207` when some failed, `408` when all failed
//! - `400` for a malformed line or an empty batch, `405` for other methods,
//!   `429` when too many batches are already running
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_fetch::{BatchConfig, Config};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         batch: BatchConfig::default()
//!             .with_max_concurrent_batches(50)
//!             .with_fetch_timeout(Duration::from_millis(500)),
//!         ..Default::default()
//!     };
//!
//!     // Serves until SIGINT/SIGTERM
//!     batch_fetch::api::start_api_server(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Admission control over in-flight batches
pub mod admission;
/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Concurrent fan-out of one batch
pub mod fanout;
/// Single-target retrieval
pub mod fetcher;
/// Batch request orchestration
pub mod handler;
/// Per-batch outcome bookkeeping and status resolution
pub mod outcome_table;
/// Core types
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use admission::{AdmissionGate, AdmissionPermit};
pub use config::{ApiConfig, BatchConfig, Config};
pub use error::{Error, Result, ToHttpStatus};
pub use fanout::FanoutExecutor;
pub use fetcher::{Fetcher, HttpFetcher};
pub use handler::{BatchHandler, BatchRequest, BatchResponse};
pub use outcome_table::{CompletedOutcomes, OutcomeTable, resolve_status};
pub use types::{
    BatchReport, BatchStatus, FAILED_SENTINEL, FetchFailure, InvalidTarget, Outcome, Target,
};

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
