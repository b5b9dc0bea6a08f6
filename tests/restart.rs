//! Re-`start` after `stop` keeps previously queued events; they are served
//! by the new worker pool rather than lost along with the old one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsepool::{AddFlags, Scheduler, StartFlags, StopFlags};

#[test]
fn queued_events_survive_a_stop_and_restart() {
    let scheduler = Scheduler::new();
    let ticks = Arc::new(AtomicUsize::new(0));

    let ticks_for_cb = Arc::clone(&ticks);
    scheduler.add(1, AddFlags::empty(), move || {
        ticks_for_cb.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(1_200));
    scheduler.stop(StopFlags::WAIT).unwrap();
    let before_restart = ticks.load(Ordering::SeqCst);
    assert!(before_restart >= 1);

    scheduler.start(StartFlags::empty()).unwrap();
    std::thread::sleep(Duration::from_millis(1_200));
    scheduler.stop(StopFlags::WAIT).unwrap();

    assert!(
        ticks.load(Ordering::SeqCst) > before_restart,
        "event did not keep firing after restart"
    );
}
