//! `pulsepool` schedules user callbacks to fire repeatedly at fixed
//! whole-second intervals on a pool of worker threads the library owns.
//!
//! It targets long-running daemons that need lightweight periodic work —
//! heartbeats, timeouts, cache sweeps — without pulling in a full event-loop
//! framework. There is no sub-second resolution, no wall-clock cron syntax,
//! and no persistence across restarts; see [`Scheduler`] for what it does
//! do.
//!
//! # Example
//!
//! ```
//! use pulsepool::{AddFlags, StartFlags, StopFlags};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = pulsepool::Scheduler::new();
//! let ticks = Arc::new(AtomicUsize::new(0));
//!
//! let ticks_for_callback = Arc::clone(&ticks);
//! scheduler.add(1, AddFlags::empty(), move || {
//!     ticks_for_callback.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! scheduler.start(StartFlags::empty()).unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(2200));
//! scheduler.stop(StopFlags::WAIT).unwrap();
//!
//! assert!(ticks.load(Ordering::SeqCst) >= 2);
//! ```
//!
//! # The process-wide default scheduler
//!
//! For call sites migrating from the C-shaped five-function API, this crate
//! also exposes free functions ([`add`], [`remove`], [`start`], [`stop`],
//! [`timewarp`]) operating on a lazily constructed default [`Scheduler`].
//! New code should generally prefer constructing its own `Scheduler`
//! directly.

pub use pulsepool_core::{
    AddFlags, Clock, EventHandle, MonotonicClock, PeriodicError, Scheduler, SchedulerBuilder,
    Seconds, StartFlags, StopFlags,
};

use std::sync::OnceLock;

fn default_scheduler() -> &'static Scheduler {
    static DEFAULT: OnceLock<Scheduler> = OnceLock::new();
    DEFAULT.get_or_init(Scheduler::new)
}

/// Registers a new event on the process-wide default scheduler.
pub fn add(interval: u64, flags: AddFlags, callback: impl FnMut() + Send + 'static) -> EventHandle {
    default_scheduler().add(interval, flags, callback)
}

/// Removes `handle` from the process-wide default scheduler.
pub fn remove(handle: &EventHandle) {
    default_scheduler().remove(handle)
}

/// Starts the process-wide default scheduler's worker pool.
pub fn start(flags: StartFlags) -> Result<(), PeriodicError> {
    default_scheduler().start(flags)
}

/// Stops the process-wide default scheduler's worker pool.
pub fn stop(flags: StopFlags) -> Result<(), PeriodicError> {
    default_scheduler().stop(flags)
}

/// Configures the timewarp watcher on the process-wide default scheduler.
pub fn timewarp(
    interval: u64,
    warptime: u64,
    callback: Option<Box<dyn FnMut() + Send>>,
) -> Result<(), PeriodicError> {
    default_scheduler().timewarp(interval, warptime, callback)
}

/// Convenience shim for callers porting C-shaped call sites, where the
/// callback is a plain function pointer plus an opaque `usize` argument
/// rather than a Rust closure.
pub fn add_fn(
    interval: u64,
    flags: AddFlags,
    func: fn(usize),
    arg: usize,
) -> EventHandle {
    add(interval, flags, move || func(arg))
}
