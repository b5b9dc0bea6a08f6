//! Fork safety (§4.6, unix only).
//!
//! A forked child inherits the exact memory image of the parent, including
//! any mutex that happened to be locked by some other thread at the instant
//! of `fork()`. If that thread was not the one that called `fork`, the lock
//! is inherited in a locked state with no thread left alive to ever unlock
//! it — any attempt by the child to take that lock deadlocks forever.
//! `pthread_atfork` lets a library pre-acquire its own locks before the fork
//! and release them again in both parent and child, which is all this
//! module does for the registry lock.
//!
//! Every [`Scheduler`](crate::scheduler::Scheduler) that registers here
//! survives independently; the upstream C library only ever had one global
//! registry; `Weak` references let the hook list quietly drop entries for
//! schedulers that have since been dropped instead of leaking them forever.

use std::sync::{Mutex, OnceLock, Weak};

/// Implemented by anything with a registry lock that needs to be held
/// across a fork and released in both halves afterward.
pub(crate) trait ForkAware: Send + Sync {
    fn fork_prepare(&self);
    fn fork_parent(&self);
    fn fork_child(&self);
}

fn hooks() -> &'static Mutex<Vec<Weak<dyn ForkAware>>> {
    static HOOKS: OnceLock<Mutex<Vec<Weak<dyn ForkAware>>>> = OnceLock::new();
    HOOKS.get_or_init(Default::default)
}

/// Registers `shared` to have its registry lock managed across forks.
/// Installs the process-wide `pthread_atfork` triple the first time this is
/// called; subsequent calls just add to the hook list.
pub(crate) fn register(shared: &std::sync::Arc<dyn ForkAware>) {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| unsafe {
        libc::pthread_atfork(Some(prepare), Some(parent), Some(child));
    });
    hooks().lock().unwrap().push(std::sync::Arc::downgrade(shared));
}

extern "C" fn prepare() {
    for hook in hooks().lock().unwrap().iter() {
        if let Some(hook) = hook.upgrade() {
            hook.fork_prepare();
        }
    }
}

extern "C" fn parent() {
    for hook in hooks().lock().unwrap().iter() {
        if let Some(hook) = hook.upgrade() {
            hook.fork_parent();
        }
    }
}

extern "C" fn child() {
    for hook in hooks().lock().unwrap().iter() {
        if let Some(hook) = hook.upgrade() {
            hook.fork_child();
        }
    }
}
