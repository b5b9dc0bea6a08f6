//! Scheduler trace lines (§4.7).
//!
//! The debug flag is latched once at `start()` time, matching the upstream
//! library's single global `global_flags` read: flipping it later has no
//! effect on a run already in progress. Diagnostics are always emitted
//! through `tracing`, just at a level that depends on the latch, so a host
//! application's own subscriber can opt into them even when `DEBUG` wasn't
//! passed to `start()`.

use std::sync::atomic::{AtomicBool, Ordering};

/// One human-readable scheduler decision, built lazily so that formatting
/// cost is paid only when something will actually consume the log line.
pub(crate) enum Decision {
    PickedEvent {
        interval: u64,
        deadline: u64,
        next_deadline: u64,
    },
    WaitingForever,
    GrewPool { total: usize, idle: usize },
    PoolExceedsCpuCount { total: usize, cpus: usize },
    ForkPrepared,
    TimewarpDetected { delta_secs: i64 },
    RestartRequested,
}

#[derive(Default)]
pub(crate) struct Diagnostics {
    debug: AtomicBool,
}

impl Diagnostics {
    pub(crate) fn latch(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn enabled(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// Logs a scheduler decision, lazily constructed, at `debug` level when
    /// the `DEBUG` start flag was latched and at `trace` level otherwise.
    pub(crate) fn log(&self, decision: impl FnOnce() -> Decision) {
        if self.enabled() {
            Self::emit(tracing::Level::DEBUG, decision());
        } else if tracing::enabled!(tracing::Level::TRACE) {
            Self::emit(tracing::Level::TRACE, decision());
        }
    }

    fn emit(level: tracing::Level, decision: Decision) {
        match decision {
            Decision::PickedEvent {
                interval,
                deadline,
                next_deadline,
            } => {
                event_at(level, "picked next event", interval, deadline, next_deadline)
            }
            Decision::WaitingForever => {
                event_at_msg(level, "registry empty, waiting for a wake")
            }
            Decision::GrewPool { total, idle } => {
                tracing::event!(tracing::Level::DEBUG, total, idle, "grew worker pool")
            }
            Decision::PoolExceedsCpuCount { total, cpus } => {
                tracing::event!(tracing::Level::DEBUG, total, cpus, "worker pool has grown past the host's cpu count")
            }
            Decision::ForkPrepared => {
                event_at_msg(level, "registry lock rebalanced across fork")
            }
            Decision::TimewarpDetected { delta_secs } => {
                tracing::event!(tracing::Level::DEBUG, delta_secs, "timewarp detected, rebasing deadlines")
            }
            Decision::RestartRequested => event_at_msg(level, "spurious wake or broadcast, restarting scan"),
        }
    }
}

// tracing's macros need the level as a literal, so route through small
// helpers keyed on the two levels we actually use here.
fn event_at(level: tracing::Level, msg: &str, interval: u64, deadline: u64, next_deadline: u64) {
    match level {
        tracing::Level::DEBUG => {
            tracing::debug!(interval, deadline, next_deadline, "{}", msg)
        }
        _ => tracing::trace!(interval, deadline, next_deadline, "{}", msg),
    }
}

fn event_at_msg(level: tracing::Level, msg: &str) {
    match level {
        tracing::Level::DEBUG => tracing::debug!("{}", msg),
        _ => tracing::trace!("{}", msg),
    }
}
