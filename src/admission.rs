//! Admission control for concurrently executing batches
//!
//! The gate is a fixed pool of permits with a non-blocking acquire. A batch that
//! cannot get a permit is rejected on the spot; nothing ever waits for capacity.
//! The permit is released when [`AdmissionPermit`] is dropped, which covers normal
//! completion, early returns, panics and cancellation of the batch future alike.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded, non-queueing gate over in-flight batches
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    limit: usize,
}

/// Proof that a batch was admitted; releases its slot on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` batches at once
    ///
    /// `limit` is capped at [`Semaphore::MAX_PERMITS`].
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Try to admit a batch without waiting
    ///
    /// Returns `None` when `limit` permits are already outstanding.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        // The semaphore is never closed, so the only error is NoPermits
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Configured capacity
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of batches currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.permits.available_permits())
    }
}
