//! The event record and the flags that govern its initial scheduling.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Seconds;

bitflags::bitflags! {
    /// Flags accepted by [`Scheduler::add`](crate::scheduler::Scheduler::add).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddFlags: u32 {
        /// First firing occurs after `interval`, not immediately.
        const DELAY = 1 << 0;
        /// Fire once, then free the record instead of rescheduling it.
        const ONESHOT = 1 << 1;
    }
}

/// The mutable scheduling state of one event.
///
/// Protected by its own mutex rather than the registry's, because a worker
/// must still be able to update it (on completion) without re-taking the
/// registry lock that was already released for the duration of the
/// callback (§4.3 step 7 in the design doc). Uses `parking_lot::Mutex`
/// rather than `std::sync::Mutex`: a callback panic caught at dispatch must
/// not poison this lock, or every later firing would find it poisoned and
/// fail before ever reaching the real closure again.
pub(crate) struct EventState {
    pub(crate) interval: Seconds,
    pub(crate) next_deadline: Seconds,
    pub(crate) last_start: Option<Seconds>,
    pub(crate) elapsed_total: Seconds,
    pub(crate) run_count: u64,
}

impl EventState {
    /// Average observed dispatch duration, or `None` if the event has never
    /// completed a run.
    pub(crate) fn avg_duration(&self) -> Option<Seconds> {
        (self.run_count > 0).then(|| self.elapsed_total / self.run_count)
    }
}

/// One registered event: its schedule, its bookkeeping, and its callback.
///
/// Exclusively owned by the registry while queued and by exactly one worker
/// while in-flight; in Rust this is expressed as shared ownership
/// (`Arc<EventRecord>`) plus the usual single-writer discipline enforced by
/// the registry and pool locks, rather than the C original's single mutable
/// owner swapped between a linked list and a worker's stack.
pub(crate) struct EventRecord {
    pub(crate) state: Mutex<EventState>,
    pub(crate) callback: Mutex<Box<dyn FnMut() + Send>>,
    /// Set when the event should be freed instead of re-queued on its next
    /// completion. Also doubles as the tombstone written by `remove` when
    /// the record is currently in-flight (§4.2).
    pub(crate) oneshot: AtomicBool,
}

impl EventRecord {
    pub(crate) fn new(
        interval: Seconds,
        next_deadline: Seconds,
        oneshot: bool,
        callback: Box<dyn FnMut() + Send>,
    ) -> Arc<Self> {
        Arc::new(EventRecord {
            state: Mutex::new(EventState {
                interval,
                next_deadline,
                last_start: None,
                elapsed_total: 0,
                run_count: 0,
            }),
            callback: Mutex::new(callback),
            oneshot: AtomicBool::new(oneshot),
        })
    }
}

/// A handle to a previously added event.
///
/// Cloning an `EventHandle` is cheap (an `Arc` bump) and safe to do from any
/// thread. Because the handle keeps its record alive, `remove` can never
/// observe a dangling pointer the way the upstream C API could: the open
/// question in the design doc about "misuse after free" does not arise.
#[derive(Clone)]
pub struct EventHandle(pub(crate) Arc<EventRecord>);

impl EventHandle {
    /// Identity comparison used by the registry to locate this handle's
    /// record among the queued events.
    pub(crate) fn ptr_eq(&self, other: &Arc<EventRecord>) -> bool {
        Arc::ptr_eq(&self.0, other)
    }

    #[cfg(test)]
    pub(crate) fn next_deadline(&self) -> Seconds {
        self.0.state.lock().next_deadline
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock();
        f.debug_struct("EventHandle")
            .field("interval", &state.interval)
            .field("next_deadline", &state.next_deadline)
            .field("run_count", &state.run_count)
            .field("oneshot", &self.0.oneshot.load(Ordering::SeqCst))
            .finish()
    }
}
