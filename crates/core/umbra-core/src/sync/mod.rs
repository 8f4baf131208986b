//! Synchronization primitives.
//!
//! Everything here spins; nothing yields to a scheduler.

mod fence;
mod loom_compat;
mod once;
mod spinlock;
mod stall;

pub use fence::Fence;
pub use once::OnceLock;
pub use spinlock::{RawSpinLock, SpinLock, SpinLockGuard};
pub use stall::{SpinWatch, StallPolicy, StallReport};
