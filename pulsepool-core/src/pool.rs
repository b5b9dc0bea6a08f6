//! Worker pool bookkeeping: the handle array and the total/idle counters.
//!
//! Thread *spawning* lives in [`crate::scheduler`], since creating a worker
//! means handing it the dispatch loop from [`crate::dispatch`] plus a handle
//! back to the registry — wiring this module doesn't need to know about.
//! What lives here is purely the state the design doc's §5 "pool lock"
//! protects: the handle array and the two counters.

use std::thread::JoinHandle;

bitflags::bitflags! {
    /// Flags accepted by [`Scheduler::start`](crate::scheduler::Scheduler::start).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StartFlags: u32 {
        /// Emit scheduler trace lines to the diagnostic sink for this run.
        const DEBUG = 1 << 0;
        /// The calling thread becomes worker #0 and `start` does not return.
        const NORETURN = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Flags accepted by [`Scheduler::stop`](crate::scheduler::Scheduler::stop).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StopFlags: u32 {
        /// Join every worker thread before returning.
        const WAIT = 1 << 0;
    }
}

/// Bookkeeping mutated only while the pool lock (the mutex wrapping this
/// struct in [`crate::scheduler::SchedulerShared`]) is held.
#[derive(Default)]
pub(crate) struct PoolState {
    pub(crate) handles: Vec<JoinHandle<()>>,
    pub(crate) idle: usize,
    pub(crate) running: bool,
}

impl PoolState {
    pub(crate) fn total(&self) -> usize {
        self.handles.len()
    }
}

/// Pure decision logic for §4.3 step 6: should the pool grow by one worker
/// right now? Kept separate from the mutation itself so it is trivially
/// unit-testable without spinning up real threads.
pub(crate) fn should_grow(
    idle_workers: usize,
    next_due_has_run_before: bool,
    expected_finish: u64,
    next_other_deadline: u64,
) -> bool {
    idle_workers == 0 && next_due_has_run_before && next_other_deadline < expected_finish
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_only_when_saturated_and_overrunning() {
        // idle worker available: no need to grow even if overrunning.
        assert!(!should_grow(1, true, 10, 5));
        // saturated, but the event has never completed a run: don't grow yet.
        assert!(!should_grow(0, false, 10, 5));
        // saturated, event has a history, and the next event is due before
        // this one is expected to finish: grow.
        assert!(should_grow(0, true, 10, 5));
        // saturated but nothing else is due before the expected finish.
        assert!(!should_grow(0, true, 10, 20));
    }
}
