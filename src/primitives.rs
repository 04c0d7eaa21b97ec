//! Word-sized atomic plumbing shared by every barrier.
//!
//! All cross-thread flags and counters in this crate are machine words
//! accessed through these re-exports. Under `cfg(loom)` the atomics come from
//! `loom` so the protocols can be model-checked, and `Backoff` becomes a shim
//! that yields to the model scheduler instead of spinning.

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use crossbeam_utils::Backoff;

#[cfg(loom)]
pub(crate) struct Backoff;

#[cfg(loom)]
impl Backoff {
    pub(crate) fn new() -> Self {
        Backoff
    }

    pub(crate) fn snooze(&self) {
        loom::thread::yield_now();
    }
}
