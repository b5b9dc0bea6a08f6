use std::io;

/// Failure kinds surfaced from the scheduler's public API.
///
/// Every variant is synchronous: it is returned directly from the call that
/// triggered it rather than delivered out of band.
#[derive(thiserror::Error, Debug)]
pub enum PeriodicError {
    /// `start` was called while the scheduler's worker pool was already running.
    #[error("periodic scheduler is already running")]
    Busy,

    /// `stop` (or `timewarp(0, ..)`) was called while nothing was running.
    #[error("periodic scheduler is not running")]
    NotRunning,

    /// A thread or condition-variable primitive failed at the OS level.
    #[error("system error spawning or joining a scheduler thread: {0}")]
    SystemError(#[from] io::Error),

    /// A dispatched callback panicked. Never returned from a public method —
    /// callbacks run on worker threads with no caller to hand a `Result`
    /// back to — this exists so the configured panic handler and the
    /// diagnostics layer have a typed value to log rather than a bare
    /// string.
    #[error("periodic callback panicked: {message}")]
    CallbackPanicked { message: String },
}
