//! Scenario 4: a single worker saturated by a slow event grows the pool so
//! a fast event keeps firing roughly on schedule.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsepool::{AddFlags, Scheduler, StartFlags, StopFlags};

#[test]
fn saturated_single_worker_spawns_additional_workers() {
    let scheduler = Scheduler::new();
    let fast_ticks = Arc::new(AtomicUsize::new(0));

    // Slow event: longer than its own interval, so it never finishes before
    // it's due again; this is what should force pool growth.
    scheduler.add(1, AddFlags::empty(), || {
        std::thread::sleep(Duration::from_millis(2_500));
    });

    let fast_ticks_for_cb = Arc::clone(&fast_ticks);
    scheduler.add(1, AddFlags::empty(), move || {
        fast_ticks_for_cb.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(6_000));
    let workers = scheduler.worker_count();
    scheduler.stop(StopFlags::WAIT).unwrap();

    assert!(workers > 1, "pool never grew past its starting worker: {workers}");
    assert!(
        fast_ticks.load(Ordering::SeqCst) >= 3,
        "fast event starved by the slow one: {} ticks",
        fast_ticks.load(Ordering::SeqCst)
    );
}
