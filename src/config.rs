//! Configuration types for batch-fetch
//!
//! All settings are fixed at construction time. Every field has a serde default, so an
//! empty JSON object deserializes to [`Config::default`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use tokio::sync::Semaphore;

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fan-out and admission settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// HTTP endpoint settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check the configuration for values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch.max_concurrent_batches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_batches must be at least 1".into(),
                key: Some("max_concurrent_batches".into()),
            });
        }
        if self.batch.max_concurrent_batches > Semaphore::MAX_PERMITS {
            return Err(Error::Config {
                message: format!(
                    "max_concurrent_batches must be at most {}",
                    Semaphore::MAX_PERMITS
                ),
                key: Some("max_concurrent_batches".into()),
            });
        }
        if self.batch.fetch_timeout.is_zero() {
            return Err(Error::Config {
                message: "fetch_timeout_ms must be greater than zero".into(),
                key: Some("fetch_timeout_ms".into()),
            });
        }
        if !self.api.path.starts_with('/') {
            return Err(Error::Config {
                message: format!("endpoint path '{}' must start with '/'", self.api.path),
                key: Some("path".into()),
            });
        }
        Ok(())
    }
}

/// Fan-out and admission configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of batches executing at once (default: 100)
    ///
    /// Requests beyond this limit are rejected immediately with 429, never queued.
    /// This does not limit the number of targets inside one batch.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Deadline for each individual target fetch (default: 1 second)
    #[serde(
        default = "default_fetch_timeout",
        rename = "fetch_timeout_ms",
        with = "duration_millis_serde"
    )]
    pub fetch_timeout: Duration,

    /// Record non-2xx HTTP responses as failures (default: false)
    ///
    /// When false, any response the target sends back counts as a success and
    /// its body length is reported.
    #[serde(default)]
    pub fail_on_error_status: bool,

    /// User-Agent sent with every sub-fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: default_max_concurrent_batches(),
            fetch_timeout: default_fetch_timeout(),
            fail_on_error_status: false,
            user_agent: default_user_agent(),
        }
    }
}

impl BatchConfig {
    /// Set the admission limit
    pub fn with_max_concurrent_batches(mut self, limit: usize) -> Self {
        self.max_concurrent_batches = limit;
        self
    }

    /// Set the per-target fetch deadline
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Treat non-2xx responses as failures
    pub fn with_fail_on_error_status(mut self, enabled: bool) -> Self {
        self.fail_on_error_status = enabled;
        self
    }
}

/// HTTP endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Path the batch endpoint is mounted at (default: "/")
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            path: default_path(),
        }
    }
}

fn default_max_concurrent_batches() -> usize {
    100
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_user_agent() -> String {
    format!("batch-fetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_path() -> String {
    "/".into()
}

// Duration as integer milliseconds, so sub-second deadlines are expressible
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
