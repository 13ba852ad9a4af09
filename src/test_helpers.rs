//! Shared test doubles for fan-out, handler and API tests.

use crate::fetcher::Fetcher;
use crate::types::{FetchFailure, Target};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the scripted fetcher does for one target
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Succeed immediately with this many bytes
    Respond(u64),
    /// Succeed with this many bytes after a delay
    Delay(Duration, u64),
    /// Fail immediately
    Fail,
    /// Never complete
    Hang,
    /// Panic inside the worker
    Panic,
}

/// Fetcher that follows a per-target script and counts what happened
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    script: HashMap<String, Step>,
    fallback: Option<Step>,
    calls: AtomicUsize,
    per_target: std::sync::Mutex<HashMap<String, usize>>,
    abandoned: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script one target
    pub(crate) fn on(mut self, target: &str, step: Step) -> Self {
        self.script.insert(target.to_string(), step);
        self
    }

    /// Step used for targets without a script entry (default: respond with 0 bytes)
    pub(crate) fn otherwise(mut self, step: Step) -> Self {
        self.fallback = Some(step);
        self
    }

    /// Total number of fetches started
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetches started for one target
    pub(crate) fn calls_for(&self, target: &str) -> usize {
        self.per_target
            .lock()
            .unwrap()
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    /// Number of fetch futures dropped before they finished
    pub(crate) fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

/// Counts a fetch future that is dropped before completing
struct AbandonProbe {
    counter: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for AbandonProbe {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target: &Target) -> Result<u64, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_target
            .lock()
            .unwrap()
            .entry(target.as_str().to_string())
            .or_default() += 1;

        let step = self
            .script
            .get(target.as_str())
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or(Step::Respond(0));

        let mut probe = AbandonProbe {
            counter: Arc::clone(&self.abandoned),
            armed: true,
        };
        let result = match step {
            Step::Respond(bytes) => Ok(bytes),
            Step::Delay(delay, bytes) => {
                tokio::time::sleep(delay).await;
                Ok(bytes)
            }
            Step::Fail => Err(FetchFailure::Transport("scripted failure".into())),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted panic for {}", target),
        };
        probe.armed = false;
        result
    }
}
