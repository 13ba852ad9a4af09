//! Batch request orchestration
//!
//! [`BatchHandler`] takes one submitted batch from method check to resolved report:
//!
//! 1. reject anything but `POST` with [`Error::MethodNotAllowed`]
//! 2. take an admission permit or reject with [`Error::Overloaded`], before the body is read
//! 3. read the body line by line, parse every target, reject the whole batch on the first
//!    malformed line with [`Error::MalformedTarget`]
//! 4. reject a batch without targets with [`Error::EmptyBatch`]
//! 5. fan out, wait for every target, resolve the overall status
//!
//! The admission permit is held until the returned future completes or is dropped.

use crate::admission::AdmissionGate;
use crate::config::BatchConfig;
use crate::error::{Error, Result, ToHttpStatus};
use crate::fanout::FanoutExecutor;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::types::{BatchReport, Target};
use axum::http::Method;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// One incoming batch as seen by the handler
pub struct BatchRequest<R> {
    /// Request method
    pub method: Method,
    /// Request body, read as newline-delimited targets
    pub body: R,
    /// Cancellation scope of the request; canceling it stops every outstanding fetch
    pub cancel: CancellationToken,
}

/// Status code and rendered body for one batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body: one size per line for 200/207, empty otherwise
    pub body: String,
}

impl BatchResponse {
    /// Status and body for a resolved batch
    pub fn from_report(report: &BatchReport) -> Self {
        Self {
            status: report.status.status_code(),
            body: report.render_body(),
        }
    }

    /// Turn a handler result into what goes on the wire
    pub fn from_result(result: &Result<BatchReport>) -> Self {
        match result {
            Ok(report) => Self::from_report(report),
            Err(e) => Self {
                status: e.status_code(),
                body: String::new(),
            },
        }
    }
}

/// Admits, validates and executes batches
#[derive(Clone)]
pub struct BatchHandler {
    gate: AdmissionGate,
    executor: FanoutExecutor,
}

impl BatchHandler {
    /// Create a handler that fetches over HTTP
    ///
    /// # Errors
    /// Returns error if the shared HTTP client cannot be built
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a handler around a custom fetcher
    pub fn with_fetcher(config: &BatchConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            gate: AdmissionGate::new(config.max_concurrent_batches),
            executor: FanoutExecutor::new(fetcher, config.fetch_timeout),
        }
    }

    /// The admission gate shared by every batch this handler runs
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run one batch to completion
    ///
    /// # Errors
    /// Returns one of the rejection errors when the batch is refused, or an internal
    /// error if the outcome table ends up inconsistent.
    pub async fn handle<R>(&self, request: BatchRequest<R>) -> Result<BatchReport>
    where
        R: AsyncBufRead + Unpin,
    {
        if request.method != Method::POST {
            return Err(Error::MethodNotAllowed {
                method: request.method.to_string(),
            });
        }

        let Some(_permit) = self.gate.try_acquire() else {
            tracing::warn!(
                limit = self.gate.limit(),
                in_flight = self.gate.in_flight(),
                "batch rejected, admission gate full"
            );
            return Err(Error::Overloaded {
                limit: self.gate.limit(),
            });
        };

        let targets = read_targets(request.body).await?;
        if targets.is_empty() {
            return Err(Error::EmptyBatch);
        }

        tracing::info!(
            targets = targets.len(),
            in_flight = self.gate.in_flight(),
            "batch accepted"
        );

        let completed = self.executor.run(targets, &request.cancel).await?;
        let report = completed.resolve();

        tracing::info!(
            status = %report.status,
            targets = completed.len(),
            failed = completed.failure_count(),
            "batch completed"
        );
        Ok(report)
    }
}

/// Read distinct targets from a newline-delimited body
///
/// Empty lines are skipped; a line holding only whitespace is not empty and is
/// rejected like any other malformed line. Duplicates keep their first position.
/// The first line that is not exactly an absolute URL rejects the whole body.
pub async fn read_targets<R>(body: R) -> Result<Vec<Target>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = body.lines();
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    let mut line_no = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::BodyRead(e.to_string()))?
    {
        line_no += 1;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            continue;
        }

        let target = Target::parse(line).map_err(|e| Error::MalformedTarget {
            line: line_no,
            reason: e.to_string(),
        })?;
        if seen.insert(target.clone()) {
            targets.push(target);
        }
    }

    Ok(targets)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedFetcher, Step};
    use crate::types::BatchStatus;
    use std::time::Duration;

    fn handler(fetcher: &Arc<ScriptedFetcher>, limit: usize) -> BatchHandler {
        let config = BatchConfig::default()
            .with_max_concurrent_batches(limit)
            .with_fetch_timeout(Duration::from_millis(200));
        BatchHandler::with_fetcher(&config, Arc::clone(fetcher) as Arc<dyn Fetcher>)
    }

    fn post(body: &str) -> BatchRequest<&[u8]> {
        BatchRequest {
            method: Method::POST,
            body: body.as_bytes(),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_read_targets_skips_empty_lines_and_dedups() {
        let body = "http://a.test/\r\n\n\r\nhttp://b.test/\nhttp://a.test/\n";
        let targets = read_targets(body.as_bytes()).await.unwrap();
        let raw: Vec<_> = targets.iter().map(Target::as_str).collect();
        assert_eq!(raw, vec!["http://a.test/", "http://b.test/"]);
    }

    #[tokio::test]
    async fn test_read_targets_reports_line_number() {
        let body = "http://a.test/\n\nnot a url\nhttp://b.test/\n";
        match read_targets(body.as_bytes()).await.unwrap_err() {
            Error::MalformedTarget { line, .. } => assert_eq!(line, 3),
            other => panic!("expected malformed target, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_targets_rejects_whitespace_only_line() {
        let body = "http://a.test/\n   \n";
        match read_targets(body.as_bytes()).await.unwrap_err() {
            Error::MalformedTarget { line, .. } => assert_eq!(line, 2),
            other => panic!("expected malformed target, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_targets_rejects_padded_and_tabbed_urls() {
        for body in [
            " http://a.test/ \n",
            "http://a.test/\n http://a.test/\n",
            "http://a\t.test/\n",
        ] {
            assert!(
                matches!(
                    read_targets(body.as_bytes()).await,
                    Err(Error::MalformedTarget { .. })
                ),
                "{body:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_padded_line_rejects_batch_without_fetching() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let err = handler(&fetcher, 10)
            .handle(post("http://a.test/\n http://a.test/\n"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedTarget { line: 2, .. }));
        assert_eq!(err.status_code(), 400);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_read_targets_rejects_invalid_utf8() {
        let body: &[u8] = b"http://a.test/\n\xff\xfe\n";
        assert!(matches!(
            read_targets(body).await.unwrap_err(),
            Error::BodyRead(_)
        ));
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on("http://a.test/", Step::Respond(1256))
                .on("http://b.test/", Step::Respond(4)),
        );
        let report = handler(&fetcher, 10)
            .handle(post("http://a.test/\nhttp://b.test/\n"))
            .await
            .unwrap();

        assert_eq!(report.status, BatchStatus::AllSucceeded);
        let mut sizes = report.sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![4, 1256]);
    }

    #[tokio::test]
    async fn test_partial_success() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on("http://down.test/", Step::Fail)
                .on("http://up.test/", Step::Respond(1256)),
        );
        let report = handler(&fetcher, 10)
            .handle(post("http://down.test/\nhttp://up.test/"))
            .await
            .unwrap();

        assert_eq!(report.status, BatchStatus::PartialSuccess);
        let mut sizes = report.sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![-1, 1256]);
        assert_eq!(BatchResponse::from_result(&Ok(report)).status, 207);
    }

    #[tokio::test]
    async fn test_all_fail_by_timeout() {
        let fetcher = Arc::new(ScriptedFetcher::new().otherwise(Step::Hang));
        let result = handler(&fetcher, 10)
            .handle(post("http://a.test/\nhttp://b.test/\n"))
            .await;

        let response = BatchResponse::from_result(&result);
        assert_eq!(response.status, 408);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_fetched_once_reported_once() {
        let fetcher = Arc::new(ScriptedFetcher::new().otherwise(Step::Respond(2)));
        let report = handler(&fetcher, 10)
            .handle(post("http://a.test/\nhttp://a.test/\nhttp://a.test/\n"))
            .await
            .unwrap();

        assert_eq!(report.sizes, vec![2]);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_line_issues_no_fetches() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let err = handler(&fetcher, 10)
            .handle(post("http://a.test/\nnot-a-url\n"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedTarget { line: 2, .. }));
        assert_eq!(err.status_code(), 400);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let err = handler(&fetcher, 10).handle(post("\n\n")).await.unwrap_err();
        assert!(matches!(err, Error::EmptyBatch));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_method_checked_before_body() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let request = BatchRequest {
            method: Method::GET,
            body: "garbage".as_bytes(),
            cancel: CancellationToken::new(),
        };
        let err = handler(&fetcher, 10).handle(request).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed { .. }));
        assert_eq!(err.status_code(), 405);
    }

    #[tokio::test]
    async fn test_overload_rejected_before_body_is_read() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let handler = handler(&fetcher, 1);
        let _held = handler.gate().try_acquire().unwrap();

        // A malformed body would be a 400 if it were read
        let err = handler.handle(post("not-a-url")).await.unwrap_err();
        assert!(matches!(err, Error::Overloaded { limit: 1 }));
        assert_eq!(err.status_code(), 429);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_after_every_exit() {
        let fetcher = Arc::new(ScriptedFetcher::new().otherwise(Step::Respond(1)));
        let handler = handler(&fetcher, 1);

        handler.handle(post("http://a.test/")).await.unwrap();
        assert_eq!(handler.gate().in_flight(), 0);

        handler.handle(post("bad")).await.unwrap_err();
        assert_eq!(handler.gate().in_flight(), 0);

        handler.handle(post("")).await.unwrap_err();
        assert_eq!(handler.gate().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_scope_fails_outstanding_targets() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on("http://fast.test/", Step::Respond(8))
                .on("http://slow.test/", Step::Hang),
        );
        let config = BatchConfig::default().with_fetch_timeout(Duration::from_secs(30));
        let handler =
            BatchHandler::with_fetcher(&config, Arc::clone(&fetcher) as Arc<dyn Fetcher>);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let report = handler
            .handle(BatchRequest {
                method: Method::POST,
                body: "http://fast.test/\nhttp://slow.test/\n".as_bytes(),
                cancel,
            })
            .await
            .unwrap();
        assert_eq!(report.status, BatchStatus::PartialSuccess);
        assert_eq!(fetcher.abandoned(), 1);
    }

    #[tokio::test]
    async fn test_dropped_batch_releases_permit() {
        let fetcher = Arc::new(ScriptedFetcher::new().otherwise(Step::Hang));
        let config = BatchConfig::default()
            .with_max_concurrent_batches(1)
            .with_fetch_timeout(Duration::from_secs(30));
        let handler =
            BatchHandler::with_fetcher(&config, Arc::clone(&fetcher) as Arc<dyn Fetcher>);

        let task = tokio::spawn({
            let handler = handler.clone();
            async move { handler.handle(post("http://a.test/")).await }
        });
        while fetcher.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(handler.gate().in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(handler.gate().in_flight(), 0);
    }
}
