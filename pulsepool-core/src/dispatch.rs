//! The per-worker dispatch loop (§4.3): pick the earliest-deadline event,
//! wait for it, run it, give it back.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, MutexGuard};

use crate::clock::Seconds;
use crate::diagnostics::Decision;
use crate::event::EventRecord;
use crate::pool::should_grow;
use crate::scheduler::{spawn_worker, SchedulerShared};

/// How long a worker waits, when the registry is empty, before re-checking
/// the stop flag. The upstream C library can block on its condvar forever
/// because `pthread_cancel` can interrupt it; Rust threads have no such
/// mechanism, so a bounded wait plus a cooperative flag check stands in for
/// it (see the cancellation-safety discussion in the design doc).
const IDLE_RECHECK: Duration = Duration::from_millis(250);

/// Scans the queue for the earliest deadline `d1` (and its index) and the
/// next-smallest deadline `d2`, mirroring the upstream `dequeue()` scan.
fn scan(queued: &[Arc<EventRecord>]) -> (Option<usize>, Seconds, Seconds) {
    let mut d1 = Seconds::MAX;
    let mut d2 = Seconds::MAX;
    let mut idx = None;

    for (i, event) in queued.iter().enumerate() {
        let deadline = event.state.lock().next_deadline;
        if deadline < d1 {
            d2 = d1;
            d1 = deadline;
            idx = Some(i);
        } else if deadline < d2 {
            d2 = deadline;
        }
    }

    (idx, d1, d2)
}

/// Holds an event removed from the registry for the span of a timed wait.
///
/// `Drop` pushes the event back into the registry it was taken from unless
/// [`into_inner`](Self::into_inner) disarmed it first. Because the guard
/// owns the registry's `queued` lock outright (rather than re-acquiring it),
/// reattachment never needs to re-lock a mutex the caller might still be
/// holding, so this works equally on the normal restart path, the early
/// stop-flag path, and an unexpected panic unwinding through the wait.
struct DetachedEvent<'q> {
    event: Option<Arc<EventRecord>>,
    queued: MutexGuard<'q, Vec<Arc<EventRecord>>>,
}

impl<'q> DetachedEvent<'q> {
    fn new(queued: MutexGuard<'q, Vec<Arc<EventRecord>>>, event: Arc<EventRecord>) -> Self {
        DetachedEvent {
            event: Some(event),
            queued,
        }
    }

    fn wait(&mut self, cond: &Condvar, timeout: Duration) {
        cond.wait_for(&mut self.queued, timeout);
    }

    /// Takes the event out for dispatch, disarming reattachment.
    fn into_inner(mut self) -> Arc<EventRecord> {
        self.event.take().expect("event taken more than once")
    }
}

impl Drop for DetachedEvent<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.queued.push(event);
        }
    }
}

pub(crate) fn worker_loop(shared: Arc<SchedulerShared>) {
    loop {
        shared.pool.lock().idle += 1;

        let (picked, d2) = 'select: loop {
            if shared.stopping.load(Ordering::SeqCst) {
                shared.pool.lock().idle -= 1;
                return;
            }

            let mut queued = shared.registry.queued.lock();
            let (idx, d1, d2) = scan(&queued);

            let Some(idx) = idx else {
                shared.diagnostics.log(|| Decision::WaitingForever);
                shared.registry.cond.wait_for(&mut queued, IDLE_RECHECK);
                continue;
            };

            let candidate = queued.remove(idx);

            let now = shared.clock.now();
            if d1 <= now {
                break 'select (candidate, d2);
            }

            let mut detached = DetachedEvent::new(queued, candidate);
            detached.wait(&shared.registry.cond, Duration::from_secs(d1 - now));

            // A new event may have shown up, or this may just be the
            // deadline arriving; double check for clock jitter either way.
            let now = shared.clock.now();
            if now >= d1 {
                break 'select (detached.into_inner(), d2);
            }

            shared.diagnostics.log(|| Decision::RestartRequested);
            // `detached` drops here, reattaching the event through the
            // registry lock it still holds.
        };

        dispatch_one(&shared, picked, d2);
    }
}

fn dispatch_one(shared: &Arc<SchedulerShared>, event: Arc<EventRecord>, d2: Seconds) {
    let now = shared.clock.now();

    {
        let mut pool = shared.pool.lock();
        pool.idle -= 1;

        let (run_count, avg) = {
            let state = event.state.lock();
            (state.run_count, state.avg_duration())
        };

        if let Some(avg) = avg {
            let expected_finish = now + avg;
            if should_grow(pool.idle, run_count > 0, expected_finish, d2) {
                match spawn_worker(Arc::clone(shared), shared.thread_name.as_deref()) {
                    Ok(handle) => {
                        pool.handles.push(handle);
                        let total = pool.total();
                        shared.diagnostics.log(|| Decision::GrewPool {
                            total,
                            idle: pool.idle,
                        });
                        let cpus = num_cpus::get();
                        if total > cpus {
                            shared
                                .diagnostics
                                .log(|| Decision::PoolExceedsCpuCount { total, cpus });
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "failed to grow worker pool");
                    }
                }
            }
        }
    }

    shared.diagnostics.log(|| Decision::PickedEvent {
        interval: event.state.lock().interval,
        deadline: now,
        next_deadline: d2,
    });

    let last_start = shared.clock.now();
    event.state.lock().last_start = Some(last_start);

    // Run the callback outside both locks. A panic here is caught rather
    // than left to unwind through the worker thread: this is the one place
    // in the loop where an "asynchronous" exit can really happen (user
    // code, not our own bookkeeping), so it is the one place the
    // reattach-or-free completion logic below needs to run unconditionally.
    let result = catch_unwind(AssertUnwindSafe(|| {
        (event.callback.lock())();
    }));

    if let Err(payload) = result {
        // The configured handler is caller-supplied code (SPEC_FULL.md §4.8)
        // and is just as capable of panicking as the callback it's reporting
        // on; catch that too; otherwise a misbehaving handler would take the
        // worker thread down and permanently shrink the pool.
        let handler_result = catch_unwind(AssertUnwindSafe(|| {
            (shared.panic_handler.lock())(payload);
        }));
        if handler_result.is_err() {
            tracing::error!("configured panic handler itself panicked");
        }
    }

    complete(shared, event, last_start);
}

fn complete(shared: &Arc<SchedulerShared>, event: Arc<EventRecord>, last_start: Seconds) {
    let now = shared.clock.now();

    if event.oneshot.load(Ordering::SeqCst) {
        // Freed: simply don't re-add it. Whatever `Arc` references remain
        // (an `EventHandle` the caller may still hold) keep the allocation
        // alive, but it is no longer queued or in-flight either way.
        return;
    }

    {
        let mut state = event.state.lock();
        state.elapsed_total += now.saturating_sub(last_start);
        state.run_count += 1;
        state.next_deadline = now + state.interval;
    }

    // No broadcast here: this worker loops straight back to the top and
    // will pick the event back up itself if it is once again the earliest,
    // matching the upstream library's `enqueue()`, which does not
    // broadcast on reschedule either.
    shared.registry.queued.lock().push(event);
}
