//! Loom compatibility shim.
//!
//! Under `cfg(loom)` the atomics, fences and spin hint come from loom so
//! the spinlock and fence can be model-checked. Otherwise they are the
//! `core` items.
//!
//! Loom atomics are not const-constructible, so types built on this shim
//! provide a non-const constructor under `cfg(loom)`.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, Ordering, fence};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicBool, Ordering, fence};

/// Busy-wait hint.
///
/// Loom needs an explicit yield to make progress on a spinning thread.
#[inline]
pub(crate) fn spin_hint() {
    #[cfg(loom)]
    loom::thread::yield_now();
    #[cfg(not(loom))]
    core::hint::spin_loop();
}
