//! Ties the registry, pool, clock, and diagnostics together into one
//! constructible object (§9's "process-wide singletons" re-architecture
//! item), plus the builder used to configure one.

use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::clock::{Clock, MonotonicClock};
use crate::diagnostics::Diagnostics;
use crate::dispatch;
use crate::error::PeriodicError;
use crate::event::{AddFlags, EventHandle, EventRecord};
use crate::fork::{self, ForkAware};
use crate::pool::{PoolState, StartFlags, StopFlags};
use crate::registry::Registry;
use crate::timewarp::{self, TimewarpHandle};

type PanicHandler = dyn Fn(Box<dyn Any + Send>) + Send + Sync;

pub(crate) fn default_panic_handler(payload: Box<dyn Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>");
    let error = PeriodicError::CallbackPanicked {
        message: message.to_string(),
    };
    tracing::error!(%error, "periodic callback panicked");
}

/// State shared between the `Scheduler` handle and every worker / timewarp
/// thread it spawns. Kept behind `Arc` so threads can outlive the `Scheduler`
/// value itself (e.g. after a `stop()` without `WAIT`).
pub(crate) struct SchedulerShared {
    pub(crate) registry: Registry,
    pub(crate) pool: Mutex<PoolState>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) stopping: AtomicBool,
    /// `parking_lot::Mutex`, not `std::sync::Mutex`: this lock is held while
    /// invoking caller-supplied code that is caught with `catch_unwind`
    /// rather than allowed to unwind further, so it must not poison.
    pub(crate) panic_handler: Mutex<Box<PanicHandler>>,
    pub(crate) timewarp: std::sync::Mutex<Option<TimewarpHandle>>,
    pub(crate) thread_name: Option<String>,
}

impl ForkAware for SchedulerShared {
    fn fork_prepare(&self) {
        self.diagnostics.log(|| crate::diagnostics::Decision::ForkPrepared);
        std::mem::forget(self.registry.queued.lock());
    }

    fn fork_parent(&self) {
        unsafe { self.registry.queued.force_unlock() };
    }

    fn fork_child(&self) {
        unsafe { self.registry.queued.force_unlock() };
    }
}

pub(crate) fn spawn_worker(
    shared: Arc<SchedulerShared>,
    thread_name: Option<&str>,
) -> io::Result<JoinHandle<()>> {
    let mut builder = thread::Builder::new();
    if let Some(name) = thread_name {
        builder = builder.name(name.to_string());
    }
    builder.spawn(move || dispatch::worker_loop(shared))
}

/// Configures a [`Scheduler`] before construction.
pub struct SchedulerBuilder {
    thread_name: Option<String>,
    panic_handler: Option<Box<PanicHandler>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        SchedulerBuilder {
            thread_name: None,
            panic_handler: None,
            clock: None,
        }
    }

    /// Name prefix applied to every worker and timewarp thread this
    /// scheduler spawns (useful for `top`/`ps`/panic messages).
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Called (instead of the default log-and-continue behavior) whenever a
    /// dispatched callback panics.
    pub fn panic_handler(
        mut self,
        handler: impl Fn(Box<dyn Any + Send>) + Send + Sync + 'static,
    ) -> Self {
        self.panic_handler = Some(Box::new(handler));
        self
    }

    #[cfg(test)]
    pub(crate) fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Scheduler {
        let shared = Arc::new(SchedulerShared {
            registry: Registry::new(),
            pool: Mutex::new(PoolState::default()),
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock)),
            diagnostics: Diagnostics::default(),
            stopping: AtomicBool::new(false),
            panic_handler: Mutex::new(
                self.panic_handler
                    .unwrap_or_else(|| Box::new(default_panic_handler)),
            ),
            timewarp: std::sync::Mutex::new(None),
            thread_name: self.thread_name,
        });

        #[cfg(unix)]
        fork::register(&(Arc::clone(&shared) as Arc<dyn ForkAware>));

        Scheduler { shared }
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An independent periodic scheduler: one event registry, one worker pool,
/// and at most one timewarp watcher.
///
/// Constructing more than one `Scheduler` is supported and expected in
/// tests; the facade crate additionally exposes a lazily constructed
/// process-wide default for source compatibility with the plain five-
/// function C-shaped API.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    pub fn new() -> Self {
        SchedulerBuilder::new().build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Registers a new event. Interval is in whole seconds; `0` is accepted
    /// and means "run as fast as possible" (documented, not rejected).
    pub fn add(
        &self,
        interval: u64,
        flags: AddFlags,
        callback: impl FnMut() + Send + 'static,
    ) -> EventHandle {
        let now = self.shared.clock.now();
        let next_deadline = if flags.contains(AddFlags::DELAY) {
            now + interval
        } else {
            0
        };
        let oneshot = flags.contains(AddFlags::ONESHOT);
        let record = EventRecord::new(interval, next_deadline, oneshot, Box::new(callback));
        self.shared.registry.add(record)
    }

    /// Removes `handle`. Always succeeds; an event currently in-flight is
    /// converted into a tombstone and runs to completion once more without
    /// being rescheduled (§4.2).
    pub fn remove(&self, handle: &EventHandle) {
        self.shared.registry.remove(handle);
    }

    /// Starts the worker pool. `NORETURN` makes the calling thread become
    /// worker #0; `start` then does not return until a later `stop()` (from
    /// another thread) drains it.
    pub fn start(&self, flags: StartFlags) -> Result<(), PeriodicError> {
        let mut pool = self.shared.pool.lock();
        if pool.running {
            return Err(PeriodicError::Busy);
        }

        self.shared.diagnostics.latch(flags.contains(StartFlags::DEBUG));
        self.shared.stopping.store(false, Ordering::SeqCst);
        pool.running = true;

        if flags.contains(StartFlags::NORETURN) {
            drop(pool);
            dispatch::worker_loop(Arc::clone(&self.shared));
            return Ok(());
        }

        match spawn_worker(Arc::clone(&self.shared), self.shared.thread_name.as_deref()) {
            Ok(handle) => {
                pool.handles.push(handle);
                Ok(())
            }
            Err(error) => {
                pool.running = false;
                Err(PeriodicError::SystemError(error))
            }
        }
    }

    /// Stops the worker pool. Queued events survive and are served again by
    /// a later `start()`. With `WAIT`, blocks until every worker has
    /// returned; without it, workers are given a best-effort signal to stop
    /// and the call returns immediately.
    pub fn stop(&self, flags: StopFlags) -> Result<(), PeriodicError> {
        let mut pool = self.shared.pool.lock();
        if !pool.running {
            return Err(PeriodicError::NotRunning);
        }

        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.registry.cond.notify_all();

        let handles = std::mem::take(&mut pool.handles);
        pool.running = false;
        pool.idle = 0;
        drop(pool);

        if flags.contains(StopFlags::WAIT) {
            for handle in handles {
                let _ = handle.join();
            }
        }
        // Without WAIT, the `JoinHandle`s are simply dropped here, which
        // detaches the OS threads rather than joining them.

        Ok(())
    }

    /// Configures (or disables, with `interval == 0`) the timewarp watcher.
    pub fn timewarp(
        &self,
        interval: u64,
        warptime: u64,
        callback: Option<Box<dyn FnMut() + Send>>,
    ) -> Result<(), PeriodicError> {
        let mut slot = self.shared.timewarp.lock().unwrap();

        if let Some(existing) = slot.take() {
            existing.stop();
        }

        if interval == 0 {
            return Ok(());
        }

        let handle = timewarp::start(Arc::clone(&self.shared), interval, warptime, callback)
            .map_err(PeriodicError::SystemError)?;
        *slot = Some(handle);
        Ok(())
    }

    /// `true` if the worker pool is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.pool.lock().running
    }

    /// Total worker thread count (for diagnostics / tests).
    pub fn worker_count(&self) -> usize {
        self.shared.pool.lock().total()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.shared.pool.lock().running {
            let _ = self.stop(StopFlags::empty());
        }
    }
}
