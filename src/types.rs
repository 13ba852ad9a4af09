//! Core types for batch fetching

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Value reported in place of a byte count for a target that failed
pub const FAILED_SENTINEL: i64 = -1;

/// One URL to retrieve
///
/// Identity is the exact text of the request body line: two targets are the same
/// only if their strings are byte-for-byte equal. The parsed [`Url`] is kept
/// alongside for the fetcher.
#[derive(Clone, Debug)]
pub struct Target {
    raw: String,
    url: Url,
}

impl Target {
    /// Parse a body line into a target
    ///
    /// Only absolute URLs are accepted. The line must already be exactly the URL: the
    /// URL parser would silently trim surrounding whitespace and drop tabs and line
    /// breaks, so such lines are rejected before parsing.
    pub fn parse(line: &str) -> std::result::Result<Self, InvalidTarget> {
        if line.trim() != line {
            return Err(InvalidTarget::SurroundingWhitespace);
        }
        if line.contains(['\t', '\r', '\n']) {
            return Err(InvalidTarget::ControlCharacter);
        }
        let url = Url::parse(line)?;
        Ok(Self {
            raw: line.to_string(),
            url,
        })
    }

    /// The exact string this target was submitted as
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Why a body line is not a valid target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTarget {
    /// Leading or trailing whitespace around the URL
    #[error("leading or trailing whitespace")]
    SurroundingWhitespace,
    /// Tab, carriage return or line feed inside the URL
    #[error("tab or line break inside URL")]
    ControlCharacter,
    /// Not a syntactically valid absolute URL
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Target {}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Why a single target's fetch failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FetchFailure {
    /// The per-target deadline elapsed
    Timeout,
    /// The batch's cancellation scope was canceled
    Canceled,
    /// The server answered with a non-success status (only when configured to fail on it)
    Status(u16),
    /// Connection, DNS, TLS or request construction failure
    Transport(String),
    /// The body stream broke before completion
    Body(String),
    /// The worker task panicked or was aborted
    Aborted(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::Canceled => write!(f, "canceled"),
            FetchFailure::Status(code) => write!(f, "HTTP status {}", code),
            FetchFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchFailure::Body(msg) => write!(f, "body error: {}", msg),
            FetchFailure::Aborted(msg) => write!(f, "worker aborted: {}", msg),
        }
    }
}

/// Terminal result of fetching one target
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The body was retrieved; holds its length in bytes
    Success(u64),
    /// The fetch failed
    Failure(FetchFailure),
}

impl Outcome {
    /// Whether this outcome is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// The per-target value reported in the response body
    ///
    /// Byte length for a success, [`FAILED_SENTINEL`] for a failure.
    pub fn reported_size(&self) -> i64 {
        match self {
            Outcome::Success(bytes) => i64::try_from(*bytes).unwrap_or(i64::MAX),
            Outcome::Failure(_) => FAILED_SENTINEL,
        }
    }
}

/// Overall status of a completed batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every target succeeded
    AllSucceeded,
    /// At least one target succeeded and at least one failed
    PartialSuccess,
    /// Every target failed
    AllFailed,
}

impl BatchStatus {
    /// HTTP status code for this batch status
    pub fn status_code(&self) -> u16 {
        match self {
            BatchStatus::AllSucceeded => 200,
            BatchStatus::PartialSuccess => 207,
            BatchStatus::AllFailed => 408,
        }
    }

    /// Whether the response carries the per-target size list
    pub fn has_body(&self) -> bool {
        !matches!(self, BatchStatus::AllFailed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::AllSucceeded => write!(f, "all_succeeded"),
            BatchStatus::PartialSuccess => write!(f, "partial_success"),
            BatchStatus::AllFailed => write!(f, "all_failed"),
        }
    }
}

/// Resolved result of a batch: overall status plus one size per distinct target
///
/// The order of `sizes` is unspecified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Overall status
    pub status: BatchStatus,
    /// One entry per distinct target: byte length, or -1 for a failure
    pub sizes: Vec<i64>,
}

impl BatchReport {
    /// Render the response body: one decimal size per line
    ///
    /// Empty when the status carries no body.
    pub fn render_body(&self) -> String {
        if !self.status.has_body() {
            return String::new();
        }
        let mut body = String::with_capacity(self.sizes.len() * 8);
        for size in &self.sizes {
            body.push_str(&size.to_string());
            body.push('\n');
        }
        body
    }
}
