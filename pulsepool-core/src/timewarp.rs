//! The timewarp watcher (§4.5): detects wall-clock jumps and rebases every
//! queued event's deadline when one occurs.
//!
//! The scheduler's own deadlines run on the monotonic clock and are already
//! immune to wall-clock adjustment; this thread exists purely so that user
//! code whose *own* logic depends on wall time gets a chance to notice the
//! jump via the optional callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crate::diagnostics::Decision;
use crate::scheduler::SchedulerShared;

pub(crate) struct TimewarpHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TimewarpHandle {
    /// Signals the watcher thread to exit at its next wake and detaches it;
    /// does not block.
    pub(crate) fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.join.take();
    }
}

pub(crate) fn start(
    shared: Arc<SchedulerShared>,
    interval: u64,
    warptime: u64,
    mut callback: Option<Box<dyn FnMut() + Send>>,
) -> std::io::Result<TimewarpHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = Arc::clone(&stop);

    let join = std::thread::Builder::new()
        .name("pulsepool-timewarp".into())
        .spawn(move || watch(shared, interval, warptime, callback.take(), stop_for_thread))?;

    Ok(TimewarpHandle {
        stop,
        join: Some(join),
    })
}

fn watch(
    shared: Arc<SchedulerShared>,
    interval: u64,
    warptime: u64,
    mut callback: Option<Box<dyn FnMut() + Send>>,
    stop: Arc<AtomicBool>,
) {
    let mut last_time = SystemTime::now();

    loop {
        // Sleep in one-second increments (mirroring the upstream library's
        // `while(remaining) remaining=sleep(remaining);` loop) so a stop
        // request is noticed within a second rather than only after the
        // full interval elapses.
        let mut remaining = interval;
        while remaining > 0 {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_secs(1));
            remaining -= 1;
        }
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let now = SystemTime::now();
        let delta_secs: i64 = match now.duration_since(last_time) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };

        if jump_detected(delta_secs, interval, warptime) {
            shared.diagnostics.log(|| Decision::TimewarpDetected { delta_secs });

            if let Some(cb) = callback.as_mut() {
                cb();
            }

            rebase(&shared);

            // The handler may have taken non-trivial time; refresh "now".
            last_time = SystemTime::now();
        } else {
            last_time = now;
        }
    }
}

/// `true` when the observed elapsed wall time `delta_secs` deviates from the
/// expected `interval` by more than `warptime`, in either direction.
fn jump_detected(delta_secs: i64, interval: u64, warptime: u64) -> bool {
    (delta_secs - interval as i64).unsigned_abs() > warptime
}

fn rebase(shared: &SchedulerShared) {
    let queued = shared.registry.queued.lock();
    let now = shared.clock.now();
    for event in queued.iter() {
        let mut state = event.state.lock();
        state.next_deadline = now + state.interval;
        state.last_start = None;
        state.elapsed_total = 0;
        state.run_count = 0;
    }
    drop(queued);
    shared.registry.cond.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fake::FakeClock;
    use crate::clock::Clock;
    use crate::diagnostics::Diagnostics;
    use crate::event::EventRecord;
    use crate::pool::PoolState;
    use crate::registry::Registry;
    use crate::scheduler::{default_panic_handler, SchedulerShared};
    use parking_lot::Mutex as PlMutex;

    #[test]
    fn jump_detected_tolerates_small_deviation_either_direction() {
        assert!(!jump_detected(10, 10, 2));
        assert!(!jump_detected(11, 10, 2));
        assert!(!jump_detected(9, 10, 2));
        assert!(jump_detected(20, 10, 2));
        assert!(jump_detected(0, 10, 2));
    }

    fn shared_with_clock(clock: Arc<dyn Clock>) -> Arc<SchedulerShared> {
        Arc::new(SchedulerShared {
            registry: Registry::new(),
            pool: PlMutex::new(PoolState::default()),
            clock,
            diagnostics: Diagnostics::default(),
            stopping: AtomicBool::new(false),
            panic_handler: PlMutex::new(Box::new(default_panic_handler)),
            timewarp: std::sync::Mutex::new(None),
            thread_name: None,
        })
    }

    #[test]
    fn rebase_resets_every_queued_events_deadline_and_stats() {
        let clock = Arc::new(FakeClock::new(1_000));
        let shared = shared_with_clock(Arc::clone(&clock) as Arc<_>);

        let record = EventRecord::new(30, 5, false, Box::new(|| {}));
        {
            let mut state = record.state.lock();
            state.run_count = 4;
            state.elapsed_total = 12;
            state.last_start = Some(990);
        }
        shared.registry.queued.lock().push(record);

        rebase(&shared);

        let queued = shared.registry.queued.lock();
        let state = queued[0].state.lock();
        assert_eq!(state.next_deadline, 1_030);
        assert_eq!(state.run_count, 0);
        assert_eq!(state.elapsed_total, 0);
        assert_eq!(state.last_start, None);
    }
}
