//! OpenAPI documentation for the batch endpoint
//!
//! Generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the batch-fetch endpoint
///
/// The path is documented at `/`; deployments that mount the endpoint elsewhere
/// via `ApiConfig::path` should adjust the served document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "batch-fetch API",
        version = "0.1.0",
        description = "Fetch a batch of URLs concurrently and report each body size",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::api::routes::submit_batch,
    ),
    tags(
        (name = "batch", description = "Batch URL fan-out")
    )
)]
pub struct ApiDoc;
