//! Fan-out execution: one concurrent fetch worker per distinct target
//!
//! [`FanoutExecutor::run`] registers every target in a fresh [`OutcomeTable`], spawns one
//! [`FetchWorker`] task per target and waits for all of them. There is no early return:
//! the join barrier releases only after every worker has written its terminal outcome.
//!
//! Each worker runs under two independent limits:
//! - its own deadline (`fetch_timeout`), which fails a slow target even if nothing
//!   else ever cancels it
//! - a child of the batch's cancellation scope, which stops every outstanding worker
//!   at once when the batch is abandoned

use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::outcome_table::{CompletedOutcomes, OutcomeTable};
use crate::types::{FetchFailure, Outcome, Target};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs one batch of fetches to completion
#[derive(Clone)]
pub struct FanoutExecutor {
    fetcher: Arc<dyn Fetcher>,
    fetch_timeout: Duration,
}

impl FanoutExecutor {
    /// Create an executor that fetches through `fetcher` with a per-target deadline
    pub fn new(fetcher: Arc<dyn Fetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
        }
    }

    /// Per-target deadline
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Fetch every target concurrently and wait for all of them
    ///
    /// Repeated targets are fetched once. Canceling `parent` makes every outstanding
    /// worker record `Failure(Canceled)` and exit. If this future is dropped before the
    /// barrier releases, the remaining workers are canceled the same way.
    pub async fn run<I>(&self, targets: I, parent: &CancellationToken) -> Result<CompletedOutcomes>
    where
        I: IntoIterator<Item = Target>,
    {
        let mut table = OutcomeTable::new();
        for target in targets {
            table.register(target);
        }
        let table = Arc::new(table);

        let scope = parent.child_token();
        let _cancel_on_drop = scope.clone().drop_guard();

        let workers: Vec<_> = table
            .targets()
            .into_iter()
            .map(|target| {
                let worker = FetchWorker {
                    target: target.clone(),
                    fetcher: Arc::clone(&self.fetcher),
                    table: Arc::clone(&table),
                    timeout: self.fetch_timeout,
                    scope: scope.child_token(),
                };
                (target, tokio::spawn(worker.run()))
            })
            .collect();

        let (targets, handles): (Vec<_>, Vec<_>) = workers.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        for (target, result) in targets.iter().zip(joined) {
            if let Err(join_err) = result {
                tracing::error!(
                    url = %target,
                    error = %join_err,
                    "fetch worker died before recording an outcome"
                );
                table.record_if_pending(
                    target,
                    Outcome::Failure(FetchFailure::Aborted(join_err.to_string())),
                );
            }
        }

        table.complete()
    }
}

/// Fetches one target and records its outcome exactly once
struct FetchWorker {
    target: Target,
    fetcher: Arc<dyn Fetcher>,
    table: Arc<OutcomeTable>,
    timeout: Duration,
    scope: CancellationToken,
}

impl FetchWorker {
    async fn run(self) {
        let outcome = tokio::select! {
            biased;
            _ = self.scope.cancelled() => Outcome::Failure(FetchFailure::Canceled),
            result = tokio::time::timeout(self.timeout, self.fetcher.fetch(&self.target)) => {
                match result {
                    Ok(Ok(bytes)) => Outcome::Success(bytes),
                    Ok(Err(failure)) => Outcome::Failure(failure),
                    Err(_) => Outcome::Failure(FetchFailure::Timeout),
                }
            }
        };

        match &outcome {
            Outcome::Success(bytes) => {
                tracing::debug!(url = %self.target, bytes, "target fetched");
            }
            Outcome::Failure(cause) => {
                tracing::debug!(url = %self.target, %cause, "target failed");
            }
        }

        if let Err(e) = self.table.record(&self.target, outcome) {
            tracing::error!(url = %self.target, error = %e, "outcome table invariant violated");
        }
    }
}
