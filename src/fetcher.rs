//! Point-to-point retrieval of a single target
//!
//! [`Fetcher`] is the seam between the fan-out engine and the network. The production
//! implementation, [`HttpFetcher`], issues one GET through a single shared
//! `reqwest::Client`, so every batch reuses the same connection pool.
//!
//! Deadlines and cancellation are applied by the caller around
//! [`Fetcher::fetch`]; implementations only need to be cancel-safe (dropping the
//! future must abort the request).

use crate::config::BatchConfig;
use crate::error::Result;
use crate::types::{FetchFailure, Target};
use async_trait::async_trait;

/// Retrieves one target and reports its body length
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the target once and return the number of body bytes received
    async fn fetch(&self, target: &Target) -> std::result::Result<u64, FetchFailure>;
}

/// Fetcher backed by a shared HTTP client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    fail_on_error_status: bool,
}

impl HttpFetcher {
    /// Build the shared client from batch configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::with_client(client, config.fail_on_error_status))
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, fail_on_error_status: bool) -> Self {
        Self {
            client,
            fail_on_error_status,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &Target) -> std::result::Result<u64, FetchFailure> {
        let mut response = self
            .client
            .get(target.url().clone())
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        if self.fail_on_error_status && !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        // Count bytes as they stream in instead of buffering the whole body
        let mut total: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchFailure::Body(e.to_string()))?
        {
            total += chunk.len() as u64;
        }

        tracing::trace!(url = %target, status = status.as_u16(), bytes = total, "fetched");
        Ok(total)
    }
}

fn transport_failure(err: &reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if err.is_connect() {
        FetchFailure::Transport(format!("connection failed: {}", err))
    } else {
        FetchFailure::Transport(err.to_string())
    }
}
