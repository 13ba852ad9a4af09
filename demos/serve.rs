//! Batch endpoint server
//!
//! Runs the batch endpoint with default settings, or with a JSON config file passed
//! as the first argument.
//!
//! ```bash
//! RUST_LOG=batch_fetch=debug,tower_http=debug cargo run --example serve
//! ```
//!
//! Then submit a batch:
//!
//! ```bash
//! printf 'https://example.com/\nhttps://www.rust-lang.org/\n' \
//!     | curl -i -X POST --data-binary @- http://127.0.0.1:8080/
//! ```

use batch_fetch::Config;
use batch_fetch::api::start_api_server;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&raw)?
        }
        None => Config::default(),
    };

    println!(
        "Batch endpoint: http://{}{}",
        config.api.bind_address, config.api.path
    );
    println!(
        "Limits: {} concurrent batches, {} ms per target",
        config.batch.max_concurrent_batches,
        config.batch.fetch_timeout.as_millis()
    );

    // Blocks until SIGINT/SIGTERM
    start_api_server(config).await?;
    Ok(())
}
