//! Monotonic whole-second clock.
//!
//! The dispatch loop and the timed condition-variable wait must agree on what
//! "now" means, or deadlines computed from one would drift against timeouts
//! computed from the other. `std::time::Instant` is monotonic on every
//! platform the standard library supports, so there is no wall-clock
//! fallback path to implement in practice; the `Clock` trait exists so tests
//! can swap in a fake clock instead of sleeping in real time.

use std::sync::OnceLock;
use std::time::Instant;

/// A monotonic second count, relative to an arbitrary epoch.
///
/// Only differences and orderings between two `Seconds` values from the same
/// `Clock` are meaningful.
pub type Seconds = u64;

/// Abstracts "what time is it" so the dispatch loop can be driven by a fake
/// clock in tests without making real threads sleep for real seconds.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic time, in whole seconds since this clock's epoch.
    fn now(&self) -> Seconds;
}

/// The clock used outside of tests: `Instant::now()` pegged to the first
/// time any scheduler touches it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl Clock for MonotonicClock {
    fn now(&self) -> Seconds {
        epoch().elapsed().as_secs()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock;
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = fake::FakeClock::new(100);
        assert_eq!(clock.now(), 100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
    }
}
