//! Single-holder admission gate for update and delete

use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct EditSlot {
    locked: bool,
    held_id: Option<i64>,
}

/// Serializes mutating operations: at most one holder at a time.
///
/// The gate remembers the id of the task being edited. Acquiring while the
/// gate is held succeeds only for the same id (re-entrant); any other id is
/// rejected. The test-and-set happens under one lock, so two callers racing
/// for the gate cannot both win.
#[derive(Clone, Default)]
pub struct EditGate {
    slot: Arc<Mutex<EditSlot>>,
}

/// Scoped hold on the edit gate; dropping it releases the gate.
pub struct EditGuard {
    gate: EditGate,
}

impl EditGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically take the gate for the given task id.
    ///
    /// Delete acquires with `None` as a placeholder id.
    pub fn try_acquire(&self, id: Option<i64>) -> bool {
        let mut slot = self.lock_slot();
        if !slot.locked {
            slot.locked = true;
            slot.held_id = id;
            true
        } else {
            slot.held_id == id
        }
    }

    /// Guard variant of [`EditGate::try_acquire`].
    ///
    /// The returned guard releases the gate when dropped, covering every
    /// exit path of the caller.
    pub fn acquire_scoped(&self, id: Option<i64>) -> Option<EditGuard> {
        if self.try_acquire(id) {
            Some(EditGuard { gate: self.clone() })
        } else {
            None
        }
    }

    /// Snapshot of the locked flag
    pub fn is_locked(&self) -> bool {
        self.lock_slot().locked
    }

    /// Id the gate is currently held for, if any
    pub fn held_id(&self) -> Option<i64> {
        self.lock_slot().held_id
    }

    /// Clear the gate unconditionally.
    pub fn release(&self) {
        let mut slot = self.lock_slot();
        slot.locked = false;
        slot.held_id = None;
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, EditSlot> {
        // Poisoning here means a panic inside one of the short critical
        // sections above, which is a bug in this module.
        self.slot.lock().expect("edit gate lock poisoned")
    }
}

impl Drop for EditGuard {
    fn drop(&mut self) {
        self.gate.release();
    }
}
