//! Spin-based mutual exclusion.
//!
//! [`RawSpinLock`] is the bare single-word lock: no ownership, no
//! reentrancy, no fairness. [`SpinLock`] wraps it around a value and hands
//! out an RAII guard; the rest of the HAL only uses the wrapped form.
//!
//! Both acquire paths use test-and-test-and-set (TTAS) to keep the cache
//! line shared while waiting. A successful acquire is followed by a full
//! fence, and release is preceded by one, so everything written by the
//! previous holder is visible to the next.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use super::loom_compat::{AtomicBool, Ordering, fence, spin_hint};
use super::stall::{SpinWatch, StallPolicy};

const UNLOCKED: bool = false;
const LOCKED: bool = true;

/// A single-word spinlock.
pub struct RawSpinLock {
    state: AtomicBool,
}

impl RawSpinLock {
    /// Creates a new unlocked lock.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            state: AtomicBool::new(UNLOCKED),
        }
    }

    /// Creates a new unlocked lock.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            state: AtomicBool::new(UNLOCKED),
        }
    }

    /// Resets the lock to the unlocked state.
    ///
    /// Requires exclusive access, so it cannot break a holder's critical
    /// section.
    pub fn init(&mut self) {
        self.state.store(UNLOCKED, Ordering::Relaxed);
    }

    /// Attempts to acquire the lock without spinning.
    ///
    /// Returns `true` if the lock was taken.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquires the lock, spinning until it becomes available.
    pub fn lock(&self) {
        while !self.try_lock() {
            while self.is_locked() {
                spin_hint();
            }
        }
        fence(Ordering::SeqCst);
    }

    /// Acquires the lock like [`lock`](Self::lock), reporting to `policy`
    /// under `site` whenever the wait exceeds its threshold.
    ///
    /// The report is advisory: the call still only returns once the lock is
    /// held.
    pub fn lock_watched(&self, policy: &StallPolicy, site: &'static str) {
        let mut watch = SpinWatch::new(policy, site);
        while !self.try_lock() {
            while self.is_locked() {
                watch.tick();
                spin_hint();
            }
        }
        fence(Ordering::SeqCst);
    }

    /// Releases the lock.
    ///
    /// The lock carries no owner, so releasing a lock held by someone else
    /// ends their critical section early. Only the holder should call this.
    pub fn unlock(&self) {
        fence(Ordering::SeqCst);
        self.state.store(UNLOCKED, Ordering::Release);
    }

    /// Returns whether the lock is currently held by anyone.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

#[cfg(not(loom))]
impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// A spinlock protecting a value of type `T`.
///
/// Const-constructible so it can live in `static` items.
pub struct SpinLock<T> {
    raw: RawSpinLock,
    name: &'static str,
    data: UnsafeCell<T>,
}

// SAFETY: Access to `data` is serialized by `raw`; `T: Send` because the
// value is handed from core to core.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new unlocked `SpinLock` wrapping `value`.
    #[cfg(not(loom))]
    pub const fn new(value: T) -> Self {
        Self::named("<unnamed>", value)
    }

    /// Creates a new unlocked `SpinLock` with a name used in stall reports.
    #[cfg(not(loom))]
    pub const fn named(name: &'static str, value: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            name,
            data: UnsafeCell::new(value),
        }
    }

    /// Creates a new unlocked `SpinLock` wrapping `value`.
    #[cfg(loom)]
    pub fn new(value: T) -> Self {
        Self::named("<unnamed>", value)
    }

    /// Creates a new unlocked `SpinLock` with a name used in stall reports.
    #[cfg(loom)]
    pub fn named(name: &'static str, value: T) -> Self {
        Self {
            raw: RawSpinLock::new(),
            name,
            data: UnsafeCell::new(value),
        }
    }

    /// Returns the name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock, spinning until it becomes available.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        self.raw.lock();
        SpinLockGuard { lock: self }
    }

    /// Acquires the lock, reporting long waits to `policy`.
    pub fn lock_watched(&self, policy: &StallPolicy) -> SpinLockGuard<'_, T> {
        self.raw.lock_watched(policy, self.name);
        SpinLockGuard { lock: self }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.raw.try_lock() {
            fence(Ordering::SeqCst);
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Returns whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns a mutable reference to the data; exclusive access makes the
    /// lock unnecessary.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// RAII guard that releases the [`SpinLock`] when dropped.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard guarantees exclusive access while it exists.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}


#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn two_threads_exclusive() {
        loom::model(|| {
            let lock = Arc::new(SpinLock::new(0u32));
            let other = {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    *lock.lock() += 1;
                })
            };
            *lock.lock() += 1;
            other.join().unwrap();
            assert_eq!(*lock.lock(), 2);
        });
    }
}
