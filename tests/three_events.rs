//! Scenario 1: three independently-interval'd events on a single worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsepool::{AddFlags, Scheduler, StartFlags, StopFlags};

#[test]
fn three_periodic_events_fire_proportionally_to_their_interval() {
    let scheduler = Scheduler::new();

    let one_s = Arc::new(AtomicUsize::new(0));
    let three_s = Arc::new(AtomicUsize::new(0));
    let five_s = Arc::new(AtomicUsize::new(0));

    for (interval, counter) in [(1, &one_s), (3, &three_s), (5, &five_s)] {
        let counter = Arc::clone(counter);
        scheduler.add(interval, AddFlags::empty(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(10_200));
    scheduler.stop(StopFlags::WAIT).unwrap();

    let ticks = one_s.load(Ordering::SeqCst);
    assert!((9..=11).contains(&ticks), "1s event fired {ticks} times");

    let ticks = three_s.load(Ordering::SeqCst);
    assert!((2..=4).contains(&ticks), "3s event fired {ticks} times");

    let ticks = five_s.load(Ordering::SeqCst);
    assert!((1..=3).contains(&ticks), "5s event fired {ticks} times");
}
