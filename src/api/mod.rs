//! HTTP transport for the batch endpoint
//!
//! A single route, mounted at [`ApiConfig::path`] for every method. Method, admission
//! and body validation are all decided by [`BatchHandler`], so the router itself never
//! rejects a request.

use crate::config::{ApiConfig, Config};
use crate::error::{Error, Result};
use crate::handler::BatchHandler;
use axum::{Router, routing::any};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the router for the batch endpoint
///
/// Every batch runs under a child of `shutdown`; canceling it winds down all
/// in-flight batches.
pub fn create_router(
    handler: Arc<BatchHandler>,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Router {
    let state = AppState::new(handler, shutdown);

    Router::new()
        .route(&config.path, any(routes::submit_batch))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the batch endpoint on an already bound listener until `shutdown` is canceled
///
/// # Errors
/// Returns error if the server fails while accepting connections
pub async fn serve(
    listener: TcpListener,
    handler: Arc<BatchHandler>,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(handler, config, shutdown.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))
}

/// Start the API server on the configured bind address.
///
/// Runs until SIGINT or SIGTERM. On shutdown the root cancellation scope is canceled,
/// so outstanding fetches stop instead of running into their deadlines.
///
/// # Example
///
/// ```no_run
/// use batch_fetch::Config;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// batch_fetch::api::start_api_server(Config::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(config: Config) -> Result<()> {
    config.validate()?;
    let handler = Arc::new(BatchHandler::new(&config.batch)?);
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        path = %config.api.path,
        max_concurrent_batches = config.batch.max_concurrent_batches,
        "Starting API server"
    );

    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            crate::wait_for_signal().await;
            shutdown.cancel();
        }
    });

    serve(listener, handler, &config.api, shutdown).await?;

    tracing::info!("API server stopped");
    Ok(())
}
