//! Non-unix stand-in for `fork.rs`.
//!
//! There is no `fork()` to guard against on these platforms, so this module
//! only needs to keep the `ForkAware` trait name and shape available for
//! `scheduler.rs` to implement against; nothing here is ever called.

pub(crate) trait ForkAware: Send + Sync {
    fn fork_prepare(&self);
    fn fork_parent(&self);
    fn fork_child(&self);
}
