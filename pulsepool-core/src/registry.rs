//! The event registry: the set of currently-queued events, plus the single
//! condition variable workers wait on.
//!
//! This intentionally holds only what §4.2 of the design doc calls the
//! "queued" side of an event's lifecycle. The in-flight side (detach,
//! dispatch, re-attach) lives in [`crate::dispatch`], which borrows the same
//! mutex and condvar rather than duplicating them.
//!
//! Uses `parking_lot::Mutex` rather than `std::sync::Mutex` specifically so
//! [`crate::fork`] can force-unlock it from a post-fork handler without
//! needing to hold a borrowed guard across the `fork()` call (§4.6).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::event::{EventHandle, EventRecord};

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) queued: Mutex<Vec<Arc<EventRecord>>>,
    pub(crate) cond: Condvar,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            queued: Mutex::new(Vec::new()),
            cond: Condvar::new(),
        }
    }

    /// Appends a freshly built record and wakes every waiter so they can
    /// reconsider whether this is now the earliest-deadline event.
    pub(crate) fn add(&self, record: Arc<EventRecord>) -> EventHandle {
        let handle = EventHandle(Arc::clone(&record));
        self.queued.lock().push(record);
        self.cond.notify_all();
        handle
    }

    /// Removes `handle`'s record if it is currently queued; otherwise marks
    /// it a tombstone so the worker holding it in-flight frees it instead of
    /// re-queuing on completion (§4.2).
    pub(crate) fn remove(&self, handle: &EventHandle) {
        let mut queued = self.queued.lock();
        if let Some(pos) = queued.iter().position(|e| handle.ptr_eq(e)) {
            queued.remove(pos);
            drop(queued);
            self.cond.notify_all();
        } else {
            // Not queued: either already freed (impossible while the caller
            // holds a live `EventHandle`) or in-flight. Tombstone it.
            handle.0.oneshot.store(true, Ordering::SeqCst);
        }
    }

    /// Number of events currently queued (not in-flight). Exposed for tests
    /// and diagnostics only.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queued.lock().len()
    }
}
