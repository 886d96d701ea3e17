//! Counting admission gate for task creation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of task creations in flight at once.
///
/// `try_acquire` never blocks: when all permits are taken the caller is
/// rejected immediately and can answer with a 429.
#[derive(Clone)]
pub struct CreateGate {
    sem: Arc<Semaphore>,
    capacity: usize,
    rejected: Arc<AtomicU64>,
}

/// Permit for one admitted creation.
///
/// Dropping the permit returns the slot to the gate, so a permit moved into
/// a job future is released on completion, failure, and panic alike.
pub struct CreatePermit {
    _permit: OwnedSemaphorePermit,
}

impl CreateGate {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "create gate capacity must be positive");
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Try to admit one creation, without blocking.
    pub fn try_acquire(&self) -> Option<CreatePermit> {
        match self.sem.clone().try_acquire_owned() {
            Ok(permit) => Some(CreatePermit { _permit: permit }),
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of creations currently admitted
    pub fn in_flight(&self) -> usize {
        self.capacity - self.sem.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total acquires rejected since startup
    pub fn rejected_total(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
