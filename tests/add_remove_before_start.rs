//! Universal invariant: `add` followed by immediate `remove`, before the
//! pool is ever started, leaves nothing behind for `start`/`stop` to run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsepool::{AddFlags, Scheduler, StartFlags, StopFlags};
use rand::Rng;

#[test]
fn add_then_remove_before_start_never_fires() {
    let scheduler = Scheduler::new();
    let fires = Arc::new(AtomicUsize::new(0));
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let interval = rng.gen_range(1..=3);
        let flags = if rng.gen_bool(0.5) {
            AddFlags::DELAY
        } else {
            AddFlags::empty()
        };

        let fires_for_cb = Arc::clone(&fires);
        let handle = scheduler.add(interval, flags, move || {
            fires_for_cb.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.remove(&handle);
    }

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(1_500));
    scheduler.stop(StopFlags::WAIT).unwrap();

    assert_eq!(fires.load(Ordering::SeqCst), 0);
}
