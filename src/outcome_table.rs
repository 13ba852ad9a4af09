//! Per-batch outcome table and status resolution
//!
//! The [`OutcomeTable`] is the only state shared between the fetch workers of a batch.
//! Its lifecycle has three phases:
//!
//! 1. **Registration** (single-threaded): targets are inserted with [`OutcomeTable::register`],
//!    which takes `&mut self`, so it cannot overlap with workers holding a shared reference.
//! 2. **Recording** (concurrent): each worker writes its terminal outcome exactly once with
//!    [`OutcomeTable::record`]. One mutex guards both the entry and the failure counter.
//! 3. **Completion** (single-threaded): after every worker has joined,
//!    [`OutcomeTable::complete`] checks that no entry is still pending and yields a
//!    [`CompletedOutcomes`], the only type that status resolution accepts.

use crate::error::{Error, Result};
use crate::types::{BatchReport, BatchStatus, Outcome, Target};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct TableState {
    /// `None` while the target's worker has not reported yet
    entries: HashMap<Target, Option<Outcome>>,
    /// Number of terminal outcomes written so far
    recorded: usize,
    /// Number of terminal outcomes that are failures
    failed: usize,
}

/// Write-once-per-key map from target to fetch outcome
#[derive(Default)]
pub struct OutcomeTable {
    state: Mutex<TableState>,
}

impl OutcomeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target in the pending state
    ///
    /// Returns `false` if the exact same target string is already registered, which
    /// is how duplicate body lines collapse into a single fetch.
    pub fn register(&mut self, target: Target) -> bool {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.entries.contains_key(&target) {
            return false;
        }
        state.entries.insert(target, None);
        true
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no target is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered targets, in no particular order
    pub fn targets(&self) -> Vec<Target> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Number of failures recorded so far
    pub fn failure_count(&self) -> usize {
        self.lock().failed
    }

    /// Number of terminal outcomes recorded so far
    pub fn recorded_count(&self) -> usize {
        self.lock().recorded
    }

    /// Write the terminal outcome for a target
    ///
    /// A second write for the same target is rejected with [`Error::DuplicateOutcome`]
    /// and the first outcome is kept.
    pub fn record(&self, target: &Target, outcome: Outcome) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let failed = outcome.is_failure();
        match state.entries.get_mut(target) {
            None => Err(Error::UnknownTarget {
                target: target.to_string(),
            }),
            Some(Some(_)) => Err(Error::DuplicateOutcome {
                target: target.to_string(),
            }),
            Some(slot) => {
                *slot = Some(outcome);
                state.recorded += 1;
                if failed {
                    state.failed += 1;
                }
                Ok(())
            }
        }
    }

    /// Write an outcome only if the target has none yet
    ///
    /// Used after the join barrier to close entries whose worker died without
    /// reporting. Returns whether the outcome was written.
    pub fn record_if_pending(&self, target: &Target, outcome: Outcome) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let failed = outcome.is_failure();
        match state.entries.get_mut(target) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                state.recorded += 1;
                if failed {
                    state.failed += 1;
                }
                true
            }
            _ => false,
        }
    }

    /// Close the table once every worker has joined
    ///
    /// Fails with [`Error::PendingOutcome`] if any target is still pending.
    pub fn complete(&self) -> Result<CompletedOutcomes> {
        let state = self.lock();
        let mut entries = Vec::with_capacity(state.entries.len());
        for (target, outcome) in &state.entries {
            match outcome {
                Some(outcome) => entries.push((target.clone(), outcome.clone())),
                None => {
                    return Err(Error::PendingOutcome {
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(CompletedOutcomes {
            entries,
            failed: state.failed,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        // Every critical section is a plain map update, so a poisoned lock still holds
        // consistent data.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Every outcome of a batch, all terminal
#[derive(Clone, Debug)]
pub struct CompletedOutcomes {
    entries: Vec<(Target, Outcome)>,
    failed: usize,
}

impl CompletedOutcomes {
    /// Number of distinct targets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch had no targets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of failed targets
    pub fn failure_count(&self) -> usize {
        self.failed
    }

    /// Look up the outcome for a target string
    pub fn get(&self, target: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(t, _)| t.as_str() == target)
            .map(|(_, outcome)| outcome)
    }

    /// Iterate over (target, outcome) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&Target, &Outcome)> {
        self.entries.iter().map(|(t, o)| (t, o))
    }

    /// Overall status of the batch
    pub fn status(&self) -> BatchStatus {
        resolve_status(self.entries.len(), self.failed)
    }

    /// Resolve into the overall status plus one reported size per target
    pub fn resolve(&self) -> BatchReport {
        BatchReport {
            status: self.status(),
            sizes: self
                .entries
                .iter()
                .map(|(_, outcome)| outcome.reported_size())
                .collect(),
        }
    }
}

/// Map failure counts to an overall status
///
/// Precedence: all failed, then all succeeded, then partial. A batch with no
/// targets counts as all failed; the handler rejects such batches before fan-out.
pub fn resolve_status(total: usize, failed: usize) -> BatchStatus {
    if failed == total {
        BatchStatus::AllFailed
    } else if failed == 0 {
        BatchStatus::AllSucceeded
    } else {
        BatchStatus::PartialSuccess
    }
}
