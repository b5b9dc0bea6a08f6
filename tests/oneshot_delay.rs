//! Scenario 2: a `ONESHOT | DELAY` event fires exactly once, roughly
//! `interval` seconds after `add`, and the registry holds nothing afterward.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulsepool::{AddFlags, Scheduler, StartFlags, StopFlags};

#[test]
fn oneshot_with_delay_fires_once_after_its_interval() {
    let scheduler = Scheduler::new();
    let fires = Arc::new(AtomicUsize::new(0));
    let fired_at = Arc::new(std::sync::Mutex::new(None));

    let fires_for_cb = Arc::clone(&fires);
    let fired_at_for_cb = Arc::clone(&fired_at);
    let start = Instant::now();
    scheduler.add(2, AddFlags::DELAY | AddFlags::ONESHOT, move || {
        fires_for_cb.fetch_add(1, Ordering::SeqCst);
        *fired_at_for_cb.lock().unwrap() = Some(start.elapsed());
    });

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(3_500));
    scheduler.stop(StopFlags::WAIT).unwrap();

    assert_eq!(fires.load(Ordering::SeqCst), 1);
    let elapsed = fired_at.lock().unwrap().expect("callback never fired");
    assert!(elapsed >= Duration::from_millis(1_900), "fired too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3_000), "fired too late: {elapsed:?}");

    // Let it run a while longer; a freed oneshot must never fire again.
    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(2_200));
    scheduler.stop(StopFlags::WAIT).unwrap();
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}
